//! 令牌服务：签发、持久化与校验

use crate::{
    auth::jwt::TokenCodec,
    config::SecurityConfig,
    error::AppError,
    models::{
        token::{AuthTokens, IssuedToken, TokenPurpose, TokenRecord},
        user::User,
    },
    repository::{TokenRepository, UserRepository},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct TokenService {
    codec: Arc<TokenCodec>,
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserRepository>,
    security: SecurityConfig,
}

impl TokenService {
    pub fn new(
        codec: Arc<TokenCodec>,
        tokens: Arc<dyn TokenRepository>,
        users: Arc<dyn UserRepository>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            codec,
            tokens,
            users,
            security,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 签发令牌（不落库）
    pub fn generate_token(
        &self,
        user_id: &Uuid,
        expires: DateTime<Utc>,
        purpose: TokenPurpose,
    ) -> Result<String, AppError> {
        self.codec.issue(user_id, expires, purpose)
    }

    /// 持久化令牌记录
    pub async fn save_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires: DateTime<Utc>,
        purpose: TokenPurpose,
        blacklisted: bool,
    ) -> Result<TokenRecord, AppError> {
        let record = TokenRecord::new(token, user_id, expires, purpose, blacklisted);
        self.tokens.save(&record).await?;
        Ok(record)
    }

    /// 校验令牌签名、有效期与用途，并返回对应的有效记录
    pub async fn verify_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<TokenRecord, AppError> {
        let claims = self.codec.parse(token, purpose).map_err(|e| {
            tracing::debug!(purpose = %purpose, error = %e, "Token rejected");
            AppError::from(e)
        })?;

        self.tokens
            .find_active(token, purpose, Some(claims.subject_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Token not found".to_string()))
    }

    /// 按用途签发令牌；需要持久化的用途同时落库
    pub async fn issue(&self, user_id: Uuid, purpose: TokenPurpose) -> Result<IssuedToken, AppError> {
        let expires = purpose.expires_from(Utc::now(), &self.security);
        let token = self.generate_token(&user_id, expires, purpose)?;

        if purpose.is_persisted() {
            self.save_token(&token, user_id, expires, purpose, false).await?;
        }

        tracing::debug!(user_id = %user_id, purpose = %purpose, "Token issued");
        Ok(IssuedToken { token, expires })
    }

    /// 为用户签发访问令牌与刷新令牌
    pub async fn generate_auth_tokens(&self, user: &User) -> Result<AuthTokens, AppError> {
        Ok(AuthTokens {
            access: self.issue(user.id, TokenPurpose::Access).await?,
            refresh: self.issue(user.id, TokenPurpose::Refresh).await?,
        })
    }

    /// 生成重置密码令牌
    pub async fn generate_reset_password_token(&self, email: &str) -> Result<String, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("No users found with this email".to_string()))?;

        self.issue(user.id, TokenPurpose::ResetPassword)
            .await
            .map(|issued| issued.token)
    }

    /// 生成邮箱验证令牌
    pub async fn generate_verify_email_token(&self, user: &User) -> Result<String, AppError> {
        self.issue(user.id, TokenPurpose::VerifyEmail)
            .await
            .map(|issued| issued.token)
    }

    pub async fn delete_token(&self, record: &TokenRecord) -> Result<(), AppError> {
        self.tokens.delete_one(record.id).await?;
        Ok(())
    }

    pub async fn delete_all(&self, user_id: Uuid, purpose: TokenPurpose) -> Result<u64, AppError> {
        self.tokens.delete_all_by_purpose(user_id, purpose).await
    }

    /// Non-blacklisted record of `purpose` for any owner
    pub async fn find_active(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<TokenRecord>, AppError> {
        self.tokens.find_active(token, purpose, None).await
    }
}
