//! Authentication-related request models

use super::user::validate_password_chars;
use serde::Deserialize;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Logout / token refresh request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Forgot-password request
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// `?token=` query carried by reset-password and verify-email links
#[derive(Debug, Deserialize, Validate)]
pub struct TokenQuery {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Reset-password body
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8), custom(function = "validate_password_chars"))]
    pub password: String,
}
