//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用错误类型
///
/// 客户端可见的变体携带面向用户的消息；基础设施类错误只暴露通用消息。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 401，使用标准状态文本
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".to_string())
    }

    /// 403，使用标准状态文本
    pub fn forbidden() -> Self {
        AppError::Forbidden("Forbidden".to_string())
    }

    /// 404，使用标准状态文本
    pub fn not_found() -> Self {
        AppError::NotFound("Not Found".to_string())
    }

    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::RateLimitExceeded => "Too Many Requests".to_string(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

/// 错误响应 DTO
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    pub timestamp: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code(),
            message: err.user_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(&self);

        if status.is_server_error() {
            tracing::error!(code = body.code, error = %self, "Application error");
        } else {
            tracing::debug!(code = body.code, error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// 从 String 转换为 AppError::Config
impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Config(s)
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 请求体校验失败
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// 请求体无法解析
impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

/// 查询参数无法解析
impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::unauthorized().code(), 401);
        assert_eq!(AppError::forbidden().code(), 403);
        assert_eq!(AppError::not_found().code(), 404);
        assert_eq!(AppError::BadRequest("test".to_string()).code(), 400);
        assert_eq!(AppError::RateLimitExceeded.code(), 429);
        assert_eq!(AppError::Internal("boom".to_string()).code(), 500);
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Database error occurred");
        assert!(!message.contains("sqlx"));

        let error = AppError::Internal("argon2 params rejected".to_string());
        assert_eq!(error.user_message(), "Internal Server Error");
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let error = AppError::Unauthorized("Incorrect email or password".to_string());
        assert_eq!(error.user_message(), "Incorrect email or password");

        let body = ErrorResponse::from(&error);
        assert_eq!(body.code, 401);
        assert_eq!(body.message, "Incorrect email or password");
        assert!(!body.timestamp.is_empty());
    }
}
