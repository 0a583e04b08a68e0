//! In-memory repositories

use super::{email_taken, TokenRepository, UserRepository};
use crate::{
    error::AppError,
    models::{
        token::{TokenPurpose, TokenRecord},
        user::{normalize_email, NewUser, User, UserChanges, UserFilter, UserPage, UserSortField},
    },
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory user store
#[derive(Default, Clone)]
pub struct MemoryUserRepository {
    users: Arc<DashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn email_in_use(&self, email: &str, exclude: Option<Uuid>) -> bool {
        let email = normalize_email(email);
        self.users
            .iter()
            .any(|entry| entry.email == email && Some(entry.id) != exclude)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.value().clone()))
    }

    async fn is_email_taken(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, AppError> {
        Ok(self.email_in_use(email, exclude))
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        if self.email_in_use(&user.email, None) {
            return Err(email_taken());
        }

        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            name: user.name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            email: normalize_email(&user.email),
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            email_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, AppError> {
        if let Some(email) = &changes.email {
            if self.email_in_use(email, Some(id)) {
                return Err(email_taken());
            }
        }

        let Some(mut entry) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        let user = entry.value_mut();
        if let Some(name) = &changes.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &changes.email {
            user.email = normalize_email(email);
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .users
            .get_mut(&id)
            .map(|mut entry| {
                entry.email_verified = true;
                entry.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(mut entry) = self.users.get_mut(&id) {
            entry.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.users.remove(&id).is_some())
    }

    async fn query(&self, filter: &UserFilter) -> Result<UserPage, AppError> {
        let mut matched: Vec<User> = self
            .users
            .iter()
            .filter(|entry| filter.name.as_ref().is_none_or(|name| &entry.name == name))
            .filter(|entry| filter.role.is_none_or(|role| entry.role == role))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            let ord = match filter.sort {
                UserSortField::Name => a.name.cmp(&b.name),
                UserSortField::Email => a.email.cmp(&b.email),
                UserSortField::Role => a.role.as_str().cmp(b.role.as_str()),
                UserSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ord = if filter.descending { ord.reverse() } else { ord };
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let total_results = matched.len() as u64;
        let results = matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();

        Ok(UserPage {
            results,
            page: filter.page,
            limit: filter.limit,
            total_results,
        })
    }
}

/// In-memory token store
#[derive(Default, Clone)]
pub struct MemoryTokenRepository {
    tokens: Arc<DashMap<Uuid, TokenRecord>>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of `purpose` owned by `user_id`
    pub fn count_for(&self, user_id: Uuid, purpose: TokenPurpose) -> usize {
        self.tokens
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.purpose == purpose)
            .count()
    }

    /// Flag a stored token as blacklisted
    pub fn blacklist(&self, token: &str) -> bool {
        let hash = TokenRecord::hash_token(token);
        let mut found = false;
        for mut entry in self.tokens.iter_mut() {
            if entry.token_hash == hash {
                entry.blacklisted = true;
                found = true;
            }
        }
        found
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenRepository {
    async fn save(&self, record: &TokenRecord) -> Result<(), AppError> {
        self.tokens.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        purpose: TokenPurpose,
        user_id: Option<Uuid>,
    ) -> Result<Option<TokenRecord>, AppError> {
        let hash = TokenRecord::hash_token(token);
        Ok(self
            .tokens
            .iter()
            .find(|entry| {
                entry.token_hash == hash
                    && entry.purpose == purpose
                    && !entry.blacklisted
                    && user_id.is_none_or(|id| entry.user_id == id)
            })
            .map(|entry| entry.value().clone()))
    }

    async fn delete_one(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tokens.remove(&id).is_some())
    }

    async fn delete_all_by_purpose(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, AppError> {
        let before = self.tokens.len();
        self.tokens
            .retain(|_, record| !(record.user_id == user_id && record.purpose == purpose));
        Ok((before - self.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use chrono::Duration;

    fn new_user(email: &str, name: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            last_name: "Tester".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_email_is_unique_case_insensitive() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("Alice@Example.com", "alice")).await.unwrap();

        let err = repo.create(new_user("alice@example.com", "other")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let found = repo.find_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");
        assert!(repo.is_email_taken("alice@example.com", None).await.unwrap());
        assert!(!repo.is_email_taken("alice@example.com", Some(found.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_query_filters_sorts_and_pages() {
        let repo = MemoryUserRepository::new();
        for name in ["carol", "alice", "bob"] {
            repo.create(new_user(&format!("{name}@example.com"), name)).await.unwrap();
        }

        let filter = UserFilter {
            name: None,
            role: None,
            sort: UserSortField::Name,
            descending: false,
            limit: 2,
            page: 1,
        };
        let page = repo.query(&filter).await.unwrap();
        assert_eq!(page.total_results, 3);
        assert_eq!(page.total_pages(), 2);
        let names: Vec<_> = page.results.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);

        let filter = UserFilter {
            name: Some("bob".to_string()),
            ..filter
        };
        let page = repo.query(&filter).await.unwrap();
        assert_eq!(page.total_results, 1);
    }

    #[tokio::test]
    async fn test_find_active_respects_purpose_owner_and_blacklist() {
        let repo = MemoryTokenRepository::new();
        let owner = Uuid::new_v4();
        let record = TokenRecord::new(
            "tok",
            owner,
            Utc::now() + Duration::hours(1),
            TokenPurpose::Refresh,
            false,
        );
        repo.save(&record).await.unwrap();

        assert!(repo.find_active("tok", TokenPurpose::Refresh, None).await.unwrap().is_some());
        assert!(repo.find_active("tok", TokenPurpose::Refresh, Some(owner)).await.unwrap().is_some());
        assert!(repo
            .find_active("tok", TokenPurpose::Refresh, Some(Uuid::new_v4()))
            .await
            .unwrap()
            .is_none());
        assert!(repo.find_active("tok", TokenPurpose::ResetPassword, None).await.unwrap().is_none());

        assert!(repo.blacklist("tok"));
        assert!(repo.find_active("tok", TokenPurpose::Refresh, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_by_purpose_leaves_other_purposes() {
        let repo = MemoryTokenRepository::new();
        let owner = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);
        for (token, purpose) in [
            ("r1", TokenPurpose::ResetPassword),
            ("r2", TokenPurpose::ResetPassword),
            ("f1", TokenPurpose::Refresh),
        ] {
            repo.save(&TokenRecord::new(token, owner, expires, purpose, false))
                .await
                .unwrap();
        }

        let removed = repo
            .delete_all_by_purpose(owner, TokenPurpose::ResetPassword)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count_for(owner, TokenPurpose::ResetPassword), 0);
        assert_eq!(repo.count_for(owner, TokenPurpose::Refresh), 1);
    }
}
