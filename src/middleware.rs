//! HTTP 中间件与应用状态
//! 请求追踪、IP 限流

use crate::{
    auth::{gate::AuthorizationGate, jwt::TokenCodec, password::PasswordHasher},
    config::{AppConfig, SecurityConfig},
    error::AppError,
    repository::{PgTokenRepository, PgUserRepository, TokenRepository, UserRepository},
    services::{AuthService, EmailSender, LogEmailSender, TokenService, UserService},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use sqlx::PgPool;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务均以 Arc 包装，Clone 只是指针拷贝。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// 内存存储模式下为 None
    pub db: Option<PgPool>,
    pub user_service: Arc<UserService>,
    pub token_service: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub email: Arc<dyn EmailSender>,
    pub gate: Arc<AuthorizationGate>,
    pub rate_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    /// 基于 PostgreSQL 存储构建应用状态
    pub fn with_postgres(config: AppConfig, db: PgPool) -> Result<Self, AppError> {
        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.clone()));
        let tokens: Arc<dyn TokenRepository> = Arc::new(PgTokenRepository::new(db.clone()));
        let email: Arc<dyn EmailSender> = Arc::new(LogEmailSender::new(config.email.clone()));
        let hasher = PasswordHasher::from_config(&config.security)?;

        Self::build(config, Some(db), users, tokens, email, hasher)
    }

    /// 用任意存储与邮件实现组装服务
    pub fn build(
        config: AppConfig,
        db: Option<PgPool>,
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        email: Arc<dyn EmailSender>,
        hasher: PasswordHasher,
    ) -> Result<Self, AppError> {
        let codec = Arc::new(TokenCodec::from_config(&config.security)?);
        let hasher = Arc::new(hasher);

        let user_service = Arc::new(UserService::new(
            users.clone(),
            hasher,
            config.security.clone(),
        ));
        let token_service = Arc::new(TokenService::new(
            codec.clone(),
            tokens,
            users.clone(),
            config.security.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(
            user_service.clone(),
            token_service.clone(),
        ));
        let gate = Arc::new(AuthorizationGate::new(codec, users));
        let rate_limiter = Arc::new(IpRateLimiter::from_config(&config.security));

        Ok(Self {
            config,
            db,
            user_service,
            token_service,
            auth_service,
            email,
            gate,
            rate_limiter,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        // 指标标签只使用静态字符串
        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            429 => "429",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        // 在响应头中回显 trace_id / request_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 全局限流中间件，按客户端 IP 计数
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.security.rate_limit_enabled {
        return Ok(next.run(req).await);
    }

    let client_ip = client_ip(&req, state.config.security.trust_proxy);

    if !state.rate_limiter.check(client_ip) {
        tracing::warn!(
            client_ip = %client_ip,
            uri = %req.uri().path(),
            "Rate limit exceeded"
        );
        metrics::counter!("rate_limited_total").increment(1);
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}

/// 获取客户端 IP
/// 信任代理时优先读取代理头，否则使用连接地址
fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let headers = req.headers();

    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ==================== 限流 ====================

/// Tracked addresses beyond which idle entries are pruned
const PRUNE_THRESHOLD: usize = 10_000;

/// IP 级别的速率限制器（滑动窗口）
pub struct IpRateLimiter {
    requests: DashMap<IpAddr, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl IpRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests: max_requests as usize,
            window,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }

    /// 记录一次请求；超出窗口配额时返回 false
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.requests.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let now = Instant::now();
        let mut entry = self.requests.entry(ip).or_default();
        let window = entry.value_mut();

        // 清理窗口外的记录
        while let Some(&front) = window.front() {
            if now.duration_since(front) < self.window {
                break;
            }
            window.pop_front();
        }

        if window.len() < self.max_requests {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// 当前跟踪的 IP 数
    pub fn tracked_ips(&self) -> usize {
        self.requests.len()
    }

    fn prune(&self) {
        let now = Instant::now();
        self.requests.retain(|_, window| {
            window
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.window)
        });
    }
}
