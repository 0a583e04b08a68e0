//! Issued-token repository (PostgreSQL)

use super::TokenRepository;
use crate::{
    error::AppError,
    models::token::{TokenPurpose, TokenRecord},
};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgTokenRepository {
    db: PgPool,
}

impl PgTokenRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn save(&self, record: &TokenRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (id, token_hash, user_id, purpose, expires_at, blacklisted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.purpose.as_str())
        .bind(record.expires_at)
        .bind(record.blacklisted)
        .bind(record.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        purpose: TokenPurpose,
        user_id: Option<Uuid>,
    ) -> Result<Option<TokenRecord>, AppError> {
        let record = sqlx::query_as::<_, TokenRecord>(
            r#"
            SELECT * FROM tokens
            WHERE token_hash = $1
                AND purpose = $2
                AND blacklisted = FALSE
                AND ($3::uuid IS NULL OR user_id = $3)
            "#,
        )
        .bind(TokenRecord::hash_token(token))
        .bind(purpose.as_str())
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_by_purpose(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1 AND purpose = $2")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
