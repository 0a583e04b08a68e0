//! 测试公共模块
//! 基于内存存储构建应用状态，并提供请求辅助函数

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    auth::password::PasswordHasher,
    config::{AppConfig, DatabaseConfig, EmailConfig, LoggingConfig, SecurityConfig, ServerConfig},
    error::AppError,
    middleware::AppState,
    models::{
        role::Role,
        token::AuthTokens,
        user::{CreateUserRequest, User},
    },
    repository::{MemoryTokenRepository, MemoryUserRepository},
    routes,
    services::EmailSender,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const TEST_PASSWORD: &str = "password1";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new(TEST_SECRET.to_string()),
            access_token_exp_minutes: 30,
            refresh_token_exp_days: 30,
            reset_password_exp_minutes: 10,
            verify_email_exp_minutes: 10,
            password_min_length: 8,
            password_require_letter: true,
            password_require_digit: true,
            password_require_uppercase: false,
            // 测试中使用最低开销的 Argon2 参数
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
            password_hash_parallelism: 1,
            rate_limit_enabled: false,
            rate_limit_max_requests: 60,
            rate_limit_window_secs: 3600,
            trust_proxy: false,
        },
        email: EmailConfig {
            from: "noreply@example.com".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        },
    }
}

/// 已发送的邮件
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl SentEmail {
    /// 从邮件正文中的链接提取令牌
    pub fn token(&self) -> Option<String> {
        let start = self.text.find("token=")? + "token=".len();
        let token: String = self.text[start..]
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        Some(token)
    }
}

/// 记录邮件而不投递
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_email(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn app_base_url(&self) -> &str {
        "http://localhost:3000"
    }
}

/// 测试上下文：应用状态与底层内存存储
pub struct TestContext {
    pub state: Arc<AppState>,
    pub users: Arc<MemoryUserRepository>,
    pub tokens: Arc<MemoryTokenRepository>,
    pub email: Arc<RecordingEmailSender>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(create_test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let tokens = Arc::new(MemoryTokenRepository::new());
        let email = Arc::new(RecordingEmailSender::default());
        let hasher =
            PasswordHasher::from_config(&config.security).expect("Failed to create hasher");

        let state = AppState::build(
            config,
            None,
            users.clone(),
            tokens.clone(),
            email.clone(),
            hasher,
        )
        .expect("Failed to build app state");

        Self {
            state: Arc::new(state),
            users,
            tokens,
            email,
        }
    }

    pub fn app(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// 创建测试用户，密码为 TEST_PASSWORD
    pub async fn create_user(&self, role: Role) -> User {
        self.state
            .user_service
            .create_user(CreateUserRequest {
                name: "Test".to_string(),
                last_name: "User".to_string(),
                email: format!("{}@example.com", Uuid::new_v4().simple()),
                password: TEST_PASSWORD.to_string(),
                role,
            })
            .await
            .expect("Failed to create test user")
    }

    pub async fn tokens_for(&self, user: &User) -> AuthTokens {
        self.state
            .token_service
            .generate_auth_tokens(user)
            .await
            .expect("Failed to issue tokens")
    }

    pub async fn access_token(&self, user: &User) -> String {
        self.tokens_for(user).await.access.token
    }
}

/// 发送请求并解析 JSON 响应（空响应体返回 Value::Null）
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, _, json) = send_with_headers(app, method, uri, bearer, body).await;
    (status, json)
}

/// 同 `send`，额外返回响应头
pub async fn send_with_headers(
    app: Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, headers, json)
}
