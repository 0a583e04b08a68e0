//! 认证授权中间件

use crate::{
    auth::gate::AuthorizationGate,
    error::AppError,
    models::{role::Permission, user::User},
};
use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Path parameter naming the account a route acts on
const OWNER_PARAM: &str = "user_id";

/// 已认证用户（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// 实现 FromRequestParts 以便在 handler 中直接提取 CurrentUser
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(AppError::unauthorized)
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Per-route authorization requirement
#[derive(Clone)]
pub struct RouteGuard {
    gate: Arc<AuthorizationGate>,
    required: &'static [Permission],
}

impl RouteGuard {
    pub fn new(gate: Arc<AuthorizationGate>, required: &'static [Permission]) -> Self {
        Self { gate, required }
    }
}

/// 认证 + 权限检查中间件
pub async fn authorize(
    State(guard): State<RouteGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let owner_id = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == OWNER_PARAM)
                .map(|(_, value)| value.to_string())
        });
    let bearer = extract_token(&parts.headers);

    let user = guard
        .gate
        .authorize(bearer.as_deref(), guard.required, owner_id.as_deref())
        .await?;

    // 附加到请求扩展
    parts.extensions.insert(CurrentUser(user));

    Ok(next.run(Request::from_parts(parts, body)).await)
}
