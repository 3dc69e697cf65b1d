use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Permission;

/// Role identifier (unique, stable key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of principal a role is meant for.
///
/// `Client` is the restricted type: own-scoped query narrowing only ever
/// applies to client principals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Staff,
    Client,
}

/// A named role: user-type tag + permission set (possibly the wildcard).
///
/// Roles are immutable data except for administrative edits through the
/// catalog; system-defined roles are protected from deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub user_type: UserType,
    pub permissions: BTreeSet<Permission>,
    #[serde(default)]
    pub system: bool,
}

impl Role {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        user_type: UserType,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            name: RoleName::new(name),
            user_type,
            permissions: permissions.into_iter().collect(),
            system: false,
        }
    }

    fn builtin(
        name: &'static str,
        user_type: UserType,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            system: true,
            ..Self::new(name, user_type, permissions)
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.permissions.contains(&Permission::Wildcard)
    }

    /// Exact membership check. No prefix/glob matching; the wildcard is
    /// interpreted by the resolver, not here.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("role not found: '{0}'")]
    NotFound(RoleName),

    #[error("system role '{0}' cannot be modified or removed")]
    SystemRole(RoleName),
}

/// Named role lookup with the platform's built-in roles pre-registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: BTreeMap<RoleName, Role>,
}

impl RoleCatalog {
    /// Catalog with only the built-in system roles.
    pub fn builtin() -> Self {
        use Permission::*;

        let mut catalog = Self {
            roles: BTreeMap::new(),
        };

        catalog.insert(Role::builtin("admin", UserType::Staff, [Wildcard]));
        catalog.insert(Role::builtin(
            "operations",
            UserType::Staff,
            [
                ShipmentsRead,
                ShipmentsWrite,
                TrackingRead,
                TrackingWrite,
                InvoicesRead,
                InvoicesWrite,
                SupportRead,
                SupportWrite,
                ClientsRead,
            ],
        ));
        catalog.insert(Role::builtin(
            "client",
            UserType::Client,
            [
                ShipmentsReadOwn,
                TrackingReadOwn,
                InvoicesReadOwn,
                SupportReadOwn,
                SupportWrite,
            ],
        ));

        catalog
    }

    fn insert(&mut self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn get(&self, name: &RoleName) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Define (or redefine) a custom role. System roles cannot be shadowed.
    pub fn define(&mut self, role: Role) -> Result<(), RoleError> {
        if let Some(existing) = self.roles.get(&role.name) {
            if existing.system {
                return Err(RoleError::SystemRole(role.name));
            }
        }
        self.insert(role);
        Ok(())
    }

    /// Remove a custom role. System roles are protected.
    pub fn remove(&mut self, name: &RoleName) -> Result<(), RoleError> {
        match self.roles.get(name) {
            None => Err(RoleError::NotFound(name.clone())),
            Some(role) if role.system => Err(RoleError::SystemRole(name.clone())),
            Some(_) => {
                self.roles.remove(name);
                Ok(())
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
