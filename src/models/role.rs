//! Role and permission domain models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role assigned to a user account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Editor,
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Moderator, Role::Editor, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Editor => "editor",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "editor" => Ok(Role::Editor),
            "user" => Ok(Role::User),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Atomic capability identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadUsers,
    CreateUsers,
    UpdateUsers,
    DeleteUsers,
    ManageUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadUsers => "read_users",
            Permission::CreateUsers => "create_users",
            Permission::UpdateUsers => "update_users",
            Permission::DeleteUsers => "delete_users",
            Permission::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_users" => Ok(Permission::ReadUsers),
            "create_users" => Ok(Permission::CreateUsers),
            "update_users" => Ok(Permission::UpdateUsers),
            "delete_users" => Ok(Permission::DeleteUsers),
            "manage_users" => Ok(Permission::ManageUsers),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Raised when a stored or submitted role/permission name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);
