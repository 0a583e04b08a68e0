//! 认证相关的 HTTP 处理器

use super::parse_body;
use crate::{
    auth::middleware::CurrentUser,
    error::AppError,
    middleware::AppState,
    models::{auth::*, user::*},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;

    let user = state.user_service.register(req).await?;
    let tokens = state.token_service.generate_auth_tokens(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserWithTokens {
            user: user.into(),
            tokens,
        }),
    ))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;

    let user = state
        .auth_service
        .login_user_with_email_and_password(&req.email, &req.password)
        .await?;
    let tokens = state.token_service.generate_auth_tokens(&user).await?;

    Ok(Json(UserWithTokens {
        user: user.into(),
        tokens,
    }))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;
    state.auth_service.logout(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 刷新令牌
pub async fn refresh_tokens(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;
    let tokens = state.auth_service.refresh_auth(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// 忘记密码：生成重置令牌并发送邮件
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;

    let token = state
        .token_service
        .generate_reset_password_token(&req.email)
        .await?;
    state
        .email
        .send_reset_password_email(&req.email, &token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 重置密码
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    query.validate()?;
    let req = parse_body(payload)?;

    state
        .auth_service
        .reset_password(&query.token, &req.password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 发送邮箱验证邮件（需登录）
pub async fn send_verification_email(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let token = state
        .token_service
        .generate_verify_email_token(&user)
        .await?;
    state
        .email
        .send_verification_email(&user.email, &token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 验证邮箱
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    query.validate()?;

    state.auth_service.verify_email(&query.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
