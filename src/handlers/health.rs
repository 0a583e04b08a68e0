//! 健康检查处理器
//! 提供 /v1、/health 和 /ready 端点

use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::{db, middleware::AppState};

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// API 根响应
#[derive(Serialize)]
pub struct IndexResponse {
    pub code: u16,
    pub message: String,
    pub timestamp: String,
}

static START_TIME: OnceCell<Instant> = OnceCell::new();

/// 记录应用启动时间（在 main.rs 中调用）
pub fn set_start_time() {
    let _ = START_TIME.set(Instant::now());
}

/// 应用运行时间（秒）
pub fn get_uptime() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

/// GET /v1
pub async fn api_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        code: StatusCode::OK.as_u16(),
        message: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 检查数据库等依赖
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let mut checks = Vec::new();

    match &state.db {
        Some(pool) => {
            let result = db::ping(pool).await;
            if let Err(e) = &result {
                tracing::warn!("Database readiness check failed: {}", e);
            }
            checks.push(HealthCheck {
                name: "database".to_string(),
                status: if result.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
                message: result.err().map(|e| e.user_message()),
            });
        }
        None => checks.push(HealthCheck {
            name: "storage".to_string(),
            status: "healthy".to_string(),
            message: Some("in-memory".to_string()),
        }),
    }

    let ready = checks.iter().all(|c| c.status == "healthy");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}
