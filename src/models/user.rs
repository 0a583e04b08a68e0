//! User domain models

use super::role::Role;
use super::token::AuthTokens;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// User account
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
    /// Trimmed and lowercased on write
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,

    // Account state
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalise an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Rejects passwords without at least one letter and one digit
pub fn validate_password_chars(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("password");
        err.message = Some("password must contain at least 1 letter and 1 number".into());
        Err(err)
    }
}

/// Fields needed to insert a new user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update applied by the repository; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Self-service registration request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub last_name: String,
    #[validate(email, length(max = 50))]
    pub email: String,
    #[validate(length(min = 8), custom(function = "validate_password_chars"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "confirmPassword must match password"))]
    pub confirm_password: String,
}

/// Admin create-user request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub last_name: String,
    #[validate(email, length(max = 50))]
    pub email: String,
    #[validate(length(min = 8), custom(function = "validate_password_chars"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Update user request; at least one field must be present
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub name: Option<String>,
    #[validate(email, length(max = 50))]
    pub email: Option<String>,
    #[validate(length(min = 8), custom(function = "validate_password_chars"))]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub name: Option<String>,
    pub role: Option<Role>,
    /// `field:asc` or `field:desc`
    pub sort_by: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// Sortable user columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortField {
    Name,
    Email,
    Role,
    CreatedAt,
}

impl UserSortField {
    pub fn column(&self) -> &'static str {
        match self {
            UserSortField::Name => "name",
            UserSortField::Email => "email",
            UserSortField::Role => "role",
            UserSortField::CreatedAt => "created_at",
        }
    }
}

/// Resolved list query handed to the repository
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub sort: UserSortField,
    pub descending: bool,
    pub limit: u32,
    pub page: u32,
}

impl UserFilter {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl From<UserQuery> for UserFilter {
    fn from(query: UserQuery) -> Self {
        let (sort, descending) = query
            .sort_by
            .as_deref()
            .map(parse_sort)
            .unwrap_or((UserSortField::CreatedAt, false));

        Self {
            name: query.name,
            role: query.role,
            sort,
            descending,
            limit: query
                .limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            page: query.page.unwrap_or(1).max(1),
        }
    }
}

/// Parse `field:order`; unknown fields fall back to creation time
fn parse_sort(raw: &str) -> (UserSortField, bool) {
    let mut parts = raw.splitn(2, ':');
    let field = match parts.next().map(str::trim) {
        Some("name") => UserSortField::Name,
        Some("email") => UserSortField::Email,
        Some("role") => UserSortField::Role,
        _ => UserSortField::CreatedAt,
    };
    let descending = matches!(parts.next().map(str::trim), Some("desc"));
    (field, descending)
}

/// One page of users
#[derive(Debug, Clone)]
pub struct UserPage {
    pub results: Vec<User>,
    pub page: u32,
    pub limit: u32,
    pub total_results: u64,
}

impl UserPage {
    pub fn total_pages(&self) -> u64 {
        if self.total_results == 0 {
            0
        } else {
            self.total_results.div_ceil(u64::from(self.limit))
        }
    }
}

/// User response (without sensitive data)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Paged list response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPageResponse {
    pub results: Vec<UserResponse>,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub total_results: u64,
}

impl From<UserPage> for UserPageResponse {
    fn from(page: UserPage) -> Self {
        let total_pages = page.total_pages();
        Self {
            results: page.results.into_iter().map(UserResponse::from).collect(),
            page: page.page,
            limit: page.limit,
            total_pages,
            total_results: page.total_results,
        }
    }
}

/// Registration / login response
#[derive(Debug, Serialize)]
pub struct UserWithTokens {
    pub user: UserResponse,
    pub tokens: AuthTokens,
}
