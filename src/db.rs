//! 数据库连接池与迁移
//! 用户与令牌表的 PostgreSQL 存储

use crate::{config::DatabaseConfig, error::AppError};
use secrecy::ExposeSecret;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;

/// 解析连接串；格式错误属于配置问题
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, AppError> {
    PgConnectOptions::from_str(config.url.expose_secret())
        .map_err(|e| AppError::Config(format!("Invalid database url: {}", e)))
}

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let options = connect_options(config)?;

    tracing::debug!(
        host = options.get_host(),
        port = options.get_port(),
        "Creating database connection pool..."
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .inspect_err(|e| tracing::error!("Failed to create database pool: {}", e))?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// 运行 users / tokens 表迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!("Migration failed: {}", e);
        AppError::Internal(format!("Migration failed: {}", e))
    })?;

    tracing::info!("Migrations completed");
    Ok(())
}

/// 就绪探针使用的连通性检查
pub async fn ping(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
