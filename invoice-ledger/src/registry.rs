//! Identity/role registry
//!
//! Roles are write-once: an identity moves from `Unregistered` to exactly one
//! other role and stays there.

use crate::{
    types::{Identity, Role},
    Error, Result,
};
use std::collections::HashMap;

/// Role assignments
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: HashMap<Identity, Role>,
}

impl RoleRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose only entry is the administrator
    pub fn with_administrator(administrator: &Identity) -> Self {
        let mut roles = HashMap::new();
        roles.insert(administrator.clone(), Role::Administrator);
        Self { roles }
    }

    /// Role of `identity`, `Unregistered` if never seen
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.roles.get(identity).copied().unwrap_or_default()
    }

    /// Check that `identity` may take a role: not null and not yet registered
    pub fn ensure_assignable(&self, identity: &Identity) -> Result<()> {
        if identity.is_null() {
            return Err(Error::InvalidCall("the null identity cannot hold a role".to_string()));
        }
        self.ensure_unregistered(identity)
    }

    /// Check that `identity` holds no role yet
    pub fn ensure_unregistered(&self, identity: &Identity) -> Result<()> {
        match self.role_of(identity) {
            Role::Unregistered => Ok(()),
            role => Err(Error::AlreadyRegistered {
                caller: identity.clone(),
                role,
            }),
        }
    }

    /// Check that `identity` holds `expected`
    pub fn ensure_role(&self, identity: &Identity, expected: Role) -> Result<()> {
        let actual = self.role_of(identity);
        if actual != expected {
            return Err(Error::RoleMismatch {
                identity: identity.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Assign a role. Fails if one is already held.
    pub fn assign(&mut self, identity: &Identity, role: Role) -> Result<()> {
        if !role.is_registered() {
            return Err(Error::InvalidCall("cannot assign Unregistered".to_string()));
        }
        self.ensure_assignable(identity)?;
        self.roles.insert(identity.clone(), role);
        Ok(())
    }

    /// Number of registered identities
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// No identity registered yet
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
