//! 认证服务：登录、登出、令牌刷新、重置密码、邮箱验证
//!
//! 失败原因只记录在 debug 日志中，对外统一折叠为固定消息，避免泄露
//! 账户是否存在等信息。

use crate::{
    error::AppError,
    models::{
        token::{AuthTokens, TokenPurpose},
        user::{UpdateUserRequest, User},
    },
    services::{TokenService, UserService},
};
use chrono::Utc;
use std::sync::Arc;

pub struct AuthService {
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(users: Arc<UserService>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    /// 邮箱 + 密码登录
    pub async fn login_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let incorrect = || AppError::Unauthorized("Incorrect email or password".to_string());

        let Some(mut user) = self.users.get_user_by_email(email).await? else {
            tracing::debug!("Login failed: unknown email");
            return Err(incorrect());
        };

        if !self.users.hasher().verify(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "Login failed: password mismatch");
            return Err(incorrect());
        }

        self.users.record_login(user.id).await?;
        user.last_login = Some(Utc::now());

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// 登出：删除刷新令牌记录
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let record = self
            .tokens
            .find_active(refresh_token, TokenPurpose::Refresh)
            .await?
            .ok_or_else(AppError::not_found)?;

        self.tokens.delete_token(&record).await?;
        tracing::info!(user_id = %record.user_id, "User logged out");
        Ok(())
    }

    /// 刷新令牌（轮换：旧刷新令牌作废）
    pub async fn refresh_auth(&self, refresh_token: &str) -> Result<AuthTokens, AppError> {
        self.try_refresh(refresh_token).await.map_err(|e| {
            tracing::debug!(error = %e, "Token refresh failed");
            AppError::Unauthorized("Please authenticate".to_string())
        })
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<AuthTokens, AppError> {
        let record = self
            .tokens
            .verify_token(refresh_token, TokenPurpose::Refresh)
            .await?;
        let user = self
            .users
            .get_user_by_id(record.user_id)
            .await?
            .ok_or_else(AppError::not_found)?;

        self.tokens.delete_token(&record).await?;
        self.tokens.generate_auth_tokens(&user).await
    }

    /// 使用重置令牌设置新密码，并作废该用户所有重置令牌
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        self.try_reset_password(token, new_password)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Password reset failed");
                AppError::Unauthorized("Password reset failed".to_string())
            })
    }

    async fn try_reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let record = self
            .tokens
            .verify_token(token, TokenPurpose::ResetPassword)
            .await?;
        let user = self
            .users
            .get_user_by_id(record.user_id)
            .await?
            .ok_or_else(AppError::not_found)?;

        self.users
            .update_user_by_id(
                user.id,
                UpdateUserRequest {
                    name: None,
                    email: None,
                    password: Some(new_password.to_string()),
                },
            )
            .await?;
        let revoked = self
            .tokens
            .delete_all(user.id, TokenPurpose::ResetPassword)
            .await?;

        tracing::info!(user_id = %user.id, revoked, "Password reset");
        Ok(())
    }

    /// 验证邮箱
    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        self.try_verify_email(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Email verification failed");
            AppError::Unauthorized("Email verification failed".to_string())
        })
    }

    async fn try_verify_email(&self, token: &str) -> Result<(), AppError> {
        let record = self
            .tokens
            .verify_token(token, TokenPurpose::VerifyEmail)
            .await?;
        let user = self
            .users
            .get_user_by_id(record.user_id)
            .await?
            .ok_or_else(AppError::not_found)?;

        self.tokens
            .delete_all(user.id, TokenPurpose::VerifyEmail)
            .await?;
        self.users.mark_email_verified(user.id).await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(())
    }
}
