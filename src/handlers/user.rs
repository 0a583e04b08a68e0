//! 用户管理的 HTTP 处理器
//!
//! 权限由路由层的授权中间件检查，这里只处理业务。

use super::parse_body;
use crate::{error::AppError, middleware::AppState, models::user::*};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;
    let user = state.user_service.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let filter = UserFilter::from(query);

    let page = state.user_service.query_users(&filter).await?;
    Ok(Json(UserPageResponse::from(page)))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_user_id(&user_id)?;

    let user = state
        .user_service
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}

/// 更新用户
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_user_id(&user_id)?;
    let req = parse_body(payload)?;
    if req.is_empty() {
        return Err(AppError::BadRequest(
            "At least one of name, email or password is required".to_string(),
        ));
    }

    let user = state.user_service.update_user_by_id(id, req).await?;
    Ok(Json(UserResponse::from(user)))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_user_id(&user_id)?;
    state.user_service.delete_user_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("\"userId\" must be a valid id".to_string()))
}
