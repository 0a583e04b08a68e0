//! Bearer-token authentication plus permission check

use crate::{
    auth::{jwt::TokenCodec, permission::RbacPolicy},
    error::AppError,
    models::{role::Permission, token::TokenPurpose, user::User},
    repository::UserRepository,
};
use std::sync::Arc;

/// Resolves the caller from an access token and decides whether it may
/// proceed.
pub struct AuthorizationGate {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserRepository>,
    policy: &'static RbacPolicy,
}

impl AuthorizationGate {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserRepository>) -> Self {
        Self::with_policy(codec, users, RbacPolicy::global())
    }

    pub fn with_policy(
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserRepository>,
        policy: &'static RbacPolicy,
    ) -> Self {
        Self {
            codec,
            users,
            policy,
        }
    }

    /// Authenticate `bearer` and check `required`.
    ///
    /// A caller lacking a permission is still let through when `owner_id`
    /// names the caller's own account.
    pub async fn authorize(
        &self,
        bearer: Option<&str>,
        required: &[Permission],
        owner_id: Option<&str>,
    ) -> Result<User, AppError> {
        let user = self.authenticate(bearer).await?;

        if required.is_empty() || self.policy.role_has_all(user.role, required) {
            return Ok(user);
        }

        if owner_id.is_some_and(|owner| owner == user.id.to_string()) {
            tracing::debug!(user_id = %user.id, "Permission check bypassed for resource owner");
            return Ok(user);
        }

        tracing::warn!(
            user_id = %user.id,
            role = %user.role,
            required = ?required,
            "Permission denied"
        );
        Err(AppError::forbidden())
    }

    async fn authenticate(&self, bearer: Option<&str>) -> Result<User, AppError> {
        let Some(token) = bearer else {
            return Err(AppError::unauthorized());
        };

        let claims = self.codec.parse(token, TokenPurpose::Access).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::unauthorized()
        })?;

        self.users
            .find_by_id(claims.subject_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.subject_id, "Token subject no longer exists");
                AppError::unauthorized()
            })
    }
}
