//! Business logic services layer

pub mod auth_service;
pub mod email_service;
pub mod token_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use email_service::{EmailSender, LogEmailSender};
pub use token_service::TokenService;
pub use user_service::UserService;
