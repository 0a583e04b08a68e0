//! Signed, time-bound tokens carrying a subject id and a purpose tag

use crate::{config::SecurityConfig, error::AppError, models::token::TokenPurpose};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// Token purpose
    #[serde(rename = "type")]
    pub purpose: TokenPurpose,

    /// JWT ID, keeps tokens issued in the same second distinct
    pub jti: String,
}

/// Verified contents of a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject_id: Uuid,
    pub expires: DateTime<Utc>,
    pub purpose: TokenPurpose,
}

/// Why a token was rejected. Never surfaced to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("expected a {expected} token, got {actual}")]
    WrongPurpose {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::unauthorized()
    }
}

/// Issues and parses HS256 tokens
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    /// Create codec from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::new(config.jwt_secret.expose_secret())
    }

    pub fn new(secret: &str) -> Result<Self, AppError> {
        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Sign a token for `subject_id` valid until `expires`
    pub fn issue(
        &self,
        subject_id: &Uuid,
        expires: DateTime<Utc>,
        purpose: TokenPurpose,
    ) -> Result<String, AppError> {
        Self::sign(subject_id, expires, purpose, &self.encoding_key)
    }

    /// Same as [`issue`](Self::issue) but signed with an arbitrary secret
    pub fn issue_with_secret(
        subject_id: &Uuid,
        expires: DateTime<Utc>,
        purpose: TokenPurpose,
        secret: &str,
    ) -> Result<String, AppError> {
        Self::sign(subject_id, expires, purpose, &EncodingKey::from_secret(secret.as_bytes()))
    }

    /// Verify signature, expiry and purpose
    pub fn parse(&self, token: &str, expected: TokenPurpose) -> Result<TokenClaims, TokenError> {
        Self::verify(token, expected, &self.decoding_key)
    }

    /// Same as [`parse`](Self::parse) but verified against an arbitrary secret
    pub fn parse_with_secret(
        token: &str,
        expected: TokenPurpose,
        secret: &str,
    ) -> Result<TokenClaims, TokenError> {
        Self::verify(token, expected, &DecodingKey::from_secret(secret.as_bytes()))
    }

    fn sign(
        subject_id: &Uuid,
        expires: DateTime<Utc>,
        purpose: TokenPurpose,
        key: &EncodingKey,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires.timestamp(),
            purpose,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, key).map_err(|e| {
            tracing::error!("Failed to encode {} token: {:?}", purpose, e);
            AppError::Internal(format!("Failed to encode {} token: {}", purpose, e))
        })
    }

    fn verify(
        token: &str,
        expected: TokenPurpose,
        key: &DecodingKey,
    ) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })?
            .claims;

        if claims.purpose != expected {
            tracing::debug!(
                "Token type mismatch: expected '{}', got '{}'",
                expected,
                claims.purpose
            );
            return Err(TokenError::WrongPurpose {
                expected,
                actual: claims.purpose,
            });
        }

        let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        let expires = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(TokenClaims {
            subject_id,
            expires,
            purpose: claims.purpose,
        })
    }
}
