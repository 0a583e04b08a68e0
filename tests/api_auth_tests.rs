//! 认证 API 集成测试

mod common;

use axum::http::StatusCode;
use common::{create_test_config, send, TestContext, TEST_PASSWORD};
use identity_service::models::{role::Role, token::TokenPurpose};
use serde_json::json;

fn register_body(email: &str) -> serde_json::Value {
    json!({
        "name": "Alice",
        "lastName": "Smith",
        "email": email,
        "password": "password1",
        "confirmPassword": "password1"
    })
}

#[tokio::test]
async fn test_register_returns_user_and_tokens() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        "POST",
        "/v1/auth/register",
        None,
        Some(register_body("Alice@Example.com")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["lastName"], "Smith");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["tokens"]["access"]["token"].is_string());
    assert!(body["tokens"]["refresh"]["token"].is_string());
    assert!(body["tokens"]["refresh"]["expires"].is_string());
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_bad_input() {
    let ctx = TestContext::new();
    let app = ctx.app();

    let (status, _) = send(app.clone(), "POST", "/v1/auth/register", None, Some(register_body("dup@example.com"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app.clone(), "POST", "/v1/auth/register", None, Some(register_body("DUP@example.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already taken");
    assert_eq!(body["code"], 400);

    let mut mismatched = register_body("other@example.com");
    mismatched["confirmPassword"] = json!("password2");
    let (status, _) = send(app.clone(), "POST", "/v1/auth/register", None, Some(mismatched)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut weak = register_body("weak@example.com");
    weak["password"] = json!("password");
    weak["confirmPassword"] = json!("password");
    let (status, _) = send(app.clone(), "POST", "/v1/auth/register", None, Some(weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app, "POST", "/v1/auth/register", None, Some(json!({"email": "x@y.io"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_login_and_wrong_password() {
    let ctx = TestContext::new();
    let user = ctx.create_user(Role::User).await;
    let app = ctx.app();

    let (status, body) = send(
        app.clone(),
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": user.email, "password": TEST_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"]["lastLogin"].is_string());

    let (status, body) = send(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": user.email, "password": "password2"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect email or password");
}

#[tokio::test]
async fn test_logout_scenario() {
    let ctx = TestContext::new();
    let user = ctx.create_user(Role::User).await;
    let tokens = ctx.tokens_for(&user).await;
    let app = ctx.app();
    let body = json!({"refreshToken": tokens.refresh.token});

    let (status, _) = send(app.clone(), "POST", "/v1/auth/logout", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(app, "POST", "/v1/auth/logout", None, Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn test_refresh_tokens_endpoint_rotates() {
    let ctx = TestContext::new();
    let user = ctx.create_user(Role::User).await;
    let tokens = ctx.tokens_for(&user).await;
    let app = ctx.app();
    let body = json!({"refreshToken": tokens.refresh.token});

    let (status, fresh) = send(app.clone(), "POST", "/v1/auth/refresh-tokens", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(fresh["access"]["token"].is_string());
    assert_ne!(fresh["refresh"]["token"], json!(tokens.refresh.token));

    let (status, err) = send(app, "POST", "/v1/auth/refresh-tokens", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["message"], "Please authenticate");
}

#[tokio::test]
async fn test_forgot_and_reset_password_flow() {
    let ctx = TestContext::new();
    let user = ctx.create_user(Role::User).await;
    let app = ctx.app();

    let (status, _) = send(
        app.clone(),
        "POST",
        "/v1/auth/forgot-password",
        None,
        Some(json!({"email": user.email})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let mail = ctx.email.last_to(&user.email).expect("reset email sent");
    assert_eq!(mail.subject, "Reset password");
    assert!(mail.text.contains("/reset-password?token="));
    let token = mail.token().unwrap();

    let uri = format!("/v1/auth/reset-password?token={}", token);
    let (status, _) = send(app.clone(), "POST", &uri, None, Some(json!({"password": "newpassword9"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(ctx.tokens.count_for(user.id, TokenPurpose::ResetPassword), 0);

    let (status, _) = send(
        app.clone(),
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"email": user.email, "password": "newpassword9"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, "POST", &uri, None, Some(json!({"password": "newpassword8"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Password reset failed");
}

#[tokio::test]
async fn test_forgot_password_unknown_email_is_not_found() {
    let ctx = TestContext::new();

    let (status, body) = send(
        ctx.app(),
        "POST",
        "/v1/auth/forgot-password",
        None,
        Some(json!({"email": "ghost@example.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No users found with this email");
    assert!(ctx.email.sent().is_empty());
}

#[tokio::test]
async fn test_reset_password_requires_token_query() {
    let ctx = TestContext::new();

    let (status, _) = send(
        ctx.app(),
        "POST",
        "/v1/auth/reset-password",
        None,
        Some(json!({"password": "newpassword9"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_and_verify_email_flow() {
    let ctx = TestContext::new();
    let user = ctx.create_user(Role::User).await;
    let access = ctx.access_token(&user).await;
    let app = ctx.app();

    let (status, _) = send(app.clone(), "POST", "/v1/auth/send-verification-email", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app.clone(), "POST", "/v1/auth/send-verification-email", Some(&access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let mail = ctx.email.last_to(&user.email).expect("verification email sent");
    assert_eq!(mail.subject, "Email Verification");
    let token = mail.token().unwrap();

    let uri = format!("/v1/auth/verify-email?token={}", token);
    let (status, _) = send(app.clone(), "POST", &uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let reloaded = ctx.state.user_service.get_user_by_id(user.id).await.unwrap().unwrap();
    assert!(reloaded.email_verified);

    let (status, body) = send(app, "POST", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Email verification failed");
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let mut config = create_test_config();
    config.security.rate_limit_enabled = true;
    config.security.rate_limit_max_requests = 2;
    let ctx = TestContext::with_config(config);
    let app = ctx.app();
    let body = json!({"email": "nobody@example.com", "password": "password1"});

    for _ in 0..2 {
        let (status, _) = send(app.clone(), "POST", "/v1/auth/login", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, err) = send(app, "POST", "/v1/auth/login", None, Some(body)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err["code"], 429);
    assert_eq!(err["message"], "Too Many Requests");
}
