//! Storage layer
//!
//! Services talk to storage only through these traits. The PostgreSQL
//! implementations back the server; the in-memory ones back tests and
//! local experiments.

pub mod memory;
pub mod token_repo;
pub mod user_repo;

pub use memory::{MemoryTokenRepository, MemoryUserRepository};
pub use token_repo::PgTokenRepository;
pub use user_repo::PgUserRepository;

use crate::{
    error::AppError,
    models::{
        token::{TokenPurpose, TokenRecord},
        user::{NewUser, User, UserChanges, UserFilter, UserPage},
    },
};
use async_trait::async_trait;
use uuid::Uuid;

/// User storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Whether another account already uses `email`
    async fn is_email_taken(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, AppError>;

    /// Insert a user; fails with `BadRequest` when the email is taken
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// Apply a partial update, returning the updated row
    async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, AppError>;

    /// Set `email_verified = true`
    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, AppError>;

    /// Record a successful login
    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError>;

    /// Delete a user
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Filtered, sorted, paged listing
    async fn query(&self, filter: &UserFilter) -> Result<UserPage, AppError>;
}

/// Issued-token storage
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert a token record
    async fn save(&self, record: &TokenRecord) -> Result<(), AppError>;

    /// Non-blacklisted record whose token and purpose match exactly, and
    /// whose owner matches `user_id` when one is given
    async fn find_active(
        &self,
        token: &str,
        purpose: TokenPurpose,
        user_id: Option<Uuid>,
    ) -> Result<Option<TokenRecord>, AppError>;

    /// Delete a single record by id
    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError>;

    /// Delete every record of `purpose` belonging to `user_id`
    async fn delete_all_by_purpose(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, AppError>;
}

pub(crate) fn email_taken() -> AppError {
    AppError::BadRequest("Email already taken".to_string())
}
