//! Token domain models

use crate::{config::SecurityConfig, models::role::UnknownVariant};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::ResetPassword => "reset-password",
            TokenPurpose::VerifyEmail => "verify-email",
        }
    }

    /// Access tokens are stateless; every other purpose is stored at issuance
    /// and deleted on redemption.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, TokenPurpose::Access)
    }

    /// Configured validity window for tokens of this purpose.
    pub fn lifetime(&self, security: &SecurityConfig) -> Duration {
        match self {
            TokenPurpose::Access => Duration::minutes(security.access_token_exp_minutes),
            TokenPurpose::Refresh => Duration::days(security.refresh_token_exp_days),
            TokenPurpose::ResetPassword => Duration::minutes(security.reset_password_exp_minutes),
            TokenPurpose::VerifyEmail => Duration::minutes(security.verify_email_exp_minutes),
        }
    }

    /// Expiry for a token of this purpose issued at `now`.
    pub fn expires_from(&self, now: DateTime<Utc>, security: &SecurityConfig) -> DateTime<Utc> {
        now + self.lifetime(security)
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenPurpose {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenPurpose::Access),
            "refresh" => Ok(TokenPurpose::Refresh),
            "reset-password" => Ok(TokenPurpose::ResetPassword),
            "verify-email" => Ok(TokenPurpose::VerifyEmail),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for TokenPurpose {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Persisted refresh / reset-password / verify-email token
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    /// SHA-256 of the token string; the raw token is never stored
    pub token_hash: String,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        purpose: TokenPurpose,
        blacklisted: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_hash: Self::hash_token(token),
            user_id,
            purpose,
            expires_at,
            blacklisted,
            created_at: Utc::now(),
        }
    }

    /// 哈希令牌用于存储
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A single issued token and its expiry
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Access + refresh pair returned on login, registration and refresh
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}
