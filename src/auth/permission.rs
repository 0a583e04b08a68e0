//! Role-based permission tables and implied-permission expansion

use crate::models::role::{Permission, Role};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static DEFAULT_POLICY: Lazy<RbacPolicy> = Lazy::new(RbacPolicy::standard);

/// Read-only RBAC tables: what each role is granted, and what each
/// permission implies.
#[derive(Debug, Clone, Default)]
pub struct RbacPolicy {
    role_rights: HashMap<Role, HashSet<Permission>>,
    implications: HashMap<Permission, HashSet<Permission>>,
}

impl RbacPolicy {
    pub fn new(
        role_rights: HashMap<Role, HashSet<Permission>>,
        implications: HashMap<Permission, HashSet<Permission>>,
    ) -> Self {
        Self {
            role_rights,
            implications,
        }
    }

    /// Process-wide policy, built on first use and never mutated.
    pub fn global() -> &'static RbacPolicy {
        &DEFAULT_POLICY
    }

    /// The built-in role and implication tables.
    pub fn standard() -> Self {
        use Permission::*;

        let role_rights = HashMap::from([
            (Role::Admin, HashSet::from([ManageUsers])),
            (Role::Moderator, HashSet::from([ReadUsers, UpdateUsers])),
            (Role::Editor, HashSet::new()),
            (Role::User, HashSet::new()),
        ]);

        // manage_users implies every other user permission
        let implications = HashMap::from([(
            ManageUsers,
            HashSet::from([ReadUsers, CreateUsers, UpdateUsers, DeleteUsers]),
        )]);

        Self::new(role_rights, implications)
    }

    /// Permissions granted directly to `role`, before expansion.
    pub fn granted(&self, role: Role) -> HashSet<Permission> {
        self.role_rights.get(&role).cloned().unwrap_or_default()
    }

    /// Closes `granted` under the implication map.
    ///
    /// Runs to a fixed point, so chains (`a -> b -> c`) and cycles are handled.
    pub fn expand<I>(&self, granted: I) -> HashSet<Permission>
    where
        I: IntoIterator<Item = Permission>,
    {
        let mut expanded: HashSet<Permission> = HashSet::new();
        let mut pending: Vec<Permission> = granted.into_iter().collect();

        while let Some(permission) = pending.pop() {
            if !expanded.insert(permission) {
                continue;
            }
            if let Some(implied) = self.implications.get(&permission) {
                pending.extend(implied.iter().filter(|p| !expanded.contains(p)).copied());
            }
        }

        expanded
    }

    /// Full effective permission set for `role`.
    pub fn permissions_for(&self, role: Role) -> HashSet<Permission> {
        self.expand(self.granted(role))
    }

    /// True when `role` holds every permission in `required`.
    pub fn role_has_all(&self, role: Role, required: &[Permission]) -> bool {
        if required.is_empty() {
            return true;
        }
        let effective = self.permissions_for(role);
        required.iter().all(|p| effective.contains(p))
    }
}
