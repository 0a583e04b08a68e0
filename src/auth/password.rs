//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with configurable parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        Self::with_params(65536, 3, 4).unwrap_or_else(|_| Self {
            argon2: Argon2::default(),
        })
    }

    /// Create hasher with explicit Argon2id cost parameters
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::with_params(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
            config.password_hash_parallelism,
        )
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Check a password against a stored hash.
    ///
    /// Mismatches and unparseable hashes both yield `false`.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        if policy.password_require_letter && !password.chars().any(|c| c.is_alphabetic()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one letter and one number".to_string(),
            ));
        }

        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one letter and one number".to_string(),
            ));
        }

        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
