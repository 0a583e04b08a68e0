//! Authentication and authorization module

pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permission;

pub use gate::AuthorizationGate;
pub use jwt::{Claims, TokenClaims, TokenCodec, TokenError};
pub use middleware::{authorize, extract_token, CurrentUser, RouteGuard};
pub use password::PasswordHasher;
pub use permission::RbacPolicy;
