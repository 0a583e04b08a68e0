//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::{HeaderName, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use crate::{
    auth::{authorize, gate::AuthorizationGate, RouteGuard},
    handlers,
    middleware::{rate_limit_middleware, request_tracking_middleware, AppState},
    models::role::Permission,
};

const NO_PERMISSIONS: &[Permission] = &[];
const READ_USERS: &[Permission] = &[Permission::ReadUsers];
const MANAGE_USERS: &[Permission] = &[Permission::ManageUsers];

/// 为单个方法路由挂载授权检查
fn guarded(
    route: MethodRouter<Arc<AppState>>,
    gate: &Arc<AuthorizationGate>,
    required: &'static [Permission],
) -> MethodRouter<Arc<AppState>> {
    route.layer(from_fn_with_state(
        RouteGuard::new(gate.clone(), required),
        authorize,
    ))
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let gate = &state.gate;

    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/v1", get(handlers::health::api_index));

    // 认证路由
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/refresh-tokens", post(handlers::auth::refresh_tokens))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password))
        .route(
            "/send-verification-email",
            guarded(
                post(handlers::auth::send_verification_email),
                gate,
                NO_PERMISSIONS,
            ),
        )
        .route("/verify-email", post(handlers::auth::verify_email));

    // 用户管理（按方法区分所需权限）
    let user_routes = Router::new()
        .route(
            "/v1/users",
            guarded(post(handlers::user::create_user), gate, MANAGE_USERS)
                .merge(guarded(get(handlers::user::list_users), gate, READ_USERS)),
        )
        .route(
            "/v1/users/{user_id}",
            guarded(get(handlers::user::get_user), gate, READ_USERS)
                .merge(guarded(
                    patch(handlers::user::update_user),
                    gate,
                    MANAGE_USERS,
                ))
                .merge(guarded(
                    delete(handlers::user::delete_user),
                    gate,
                    MANAGE_USERS,
                )),
        );

    let router = Router::new()
        .merge(public_routes)
        .nest("/v1/auth", auth_routes)
        .merge(user_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    with_security_headers(router)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// 所有响应默认附带的安全头
const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';frame-ancestors 'self';object-src 'none'",
    ),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-dns-prefetch-control", "off"),
    ("x-xss-protection", "0"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-permitted-cross-domain-policies", "none"),
];

/// 挂载安全响应头；处理器已设置的头不覆盖
fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

/// CORS 配置；"*" 表示允许任意来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}
