//! 用户服务：账户的增删改查

use crate::{
    auth::password::PasswordHasher,
    config::SecurityConfig,
    error::AppError,
    models::{
        role::Role,
        user::{
            CreateUserRequest, NewUser, RegisterRequest, UpdateUserRequest, User, UserChanges,
            UserFilter, UserPage,
        },
    },
    repository::{email_taken, UserRepository},
};
use std::sync::Arc;
use uuid::Uuid;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<PasswordHasher>,
    security: SecurityConfig,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<PasswordHasher>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            users,
            hasher,
            security,
        }
    }

    /// 创建用户
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError> {
        if self.users.is_email_taken(&req.email, None).await? {
            return Err(email_taken());
        }

        PasswordHasher::validate_password_policy(&req.password, &self.security)?;
        let password_hash = self.hasher.hash(&req.password)?;

        let user = self
            .users
            .create(NewUser {
                name: req.name,
                last_name: req.last_name,
                email: req.email,
                password_hash,
                role: req.role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// 自助注册，角色固定为普通用户
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        self.create_user(CreateUserRequest {
            name: req.name,
            last_name: req.last_name,
            email: req.email,
            password: req.password,
            role: Role::User,
        })
        .await
    }

    pub async fn query_users(&self, filter: &UserFilter) -> Result<UserPage, AppError> {
        self.users.query(filter).await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.users.find_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users.find_by_email(email).await
    }

    /// 更新用户；密码会重新哈希
    pub async fn update_user_by_id(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        if self.users.find_by_id(id).await?.is_none() {
            return Err(user_not_found());
        }

        if let Some(email) = &req.email {
            if self.users.is_email_taken(email, Some(id)).await? {
                return Err(email_taken());
            }
        }

        let password_hash = match &req.password {
            Some(password) => {
                PasswordHasher::validate_password_policy(password, &self.security)?;
                Some(self.hasher.hash(password)?)
            }
            None => None,
        };

        let changes = UserChanges {
            name: req.name,
            email: req.email,
            password_hash,
        };

        self.users
            .update(id, &changes)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> Result<(), AppError> {
        if self.users.mark_email_verified(id).await? {
            Ok(())
        } else {
            Err(user_not_found())
        }
    }

    pub async fn record_login(&self, id: Uuid) -> Result<(), AppError> {
        self.users.touch_last_login(id).await
    }

    /// 删除用户
    pub async fn delete_user_by_id(&self, id: Uuid) -> Result<(), AppError> {
        if !self.users.delete(id).await? {
            return Err(user_not_found());
        }

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}
