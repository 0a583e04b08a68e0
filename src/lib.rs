//! 身份认证服务库
//! 令牌生命周期、凭证校验、基于角色的权限检查

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
