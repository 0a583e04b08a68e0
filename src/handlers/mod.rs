//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod user;

use crate::error::AppError;
use axum::{extract::rejection::JsonRejection, Json};
use validator::Validate;

/// 解析并校验 JSON 请求体
pub(crate) fn parse_body<T: Validate>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(body) = payload?;
    body.validate()?;
    Ok(body)
}
