//! User repository (PostgreSQL)

use super::{email_taken, UserRepository};
use crate::{
    error::AppError,
    models::user::{normalize_email, NewUser, User, UserChanges, UserFilter, UserPage},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a UserFilter) {
        if let Some(name) = &filter.name {
            qb.push(" AND name = ").push_bind(name);
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
    }
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => email_taken(),
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn is_email_taken(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(normalize_email(email))
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;

        Ok(taken)
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name.trim())
        .bind(user.last_name.trim())
        .bind(normalize_email(&user.email))
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.email.as_deref().map(normalize_email))
        .bind(&changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, filter: &UserFilter) -> Result<UserPage, AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        Self::push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
        Self::push_filters(&mut qb, filter);
        qb.push(format!(
            " ORDER BY {} {}, id ASC",
            filter.sort.column(),
            if filter.descending { "DESC" } else { "ASC" }
        ));
        qb.push(" LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let results = qb.build_query_as::<User>().fetch_all(&self.db).await?;

        Ok(UserPage {
            results,
            page: filter.page,
            limit: filter.limit,
            total_results: total.max(0) as u64,
        })
    }
}
