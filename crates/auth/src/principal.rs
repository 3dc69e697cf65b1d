use core::str::FromStr;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cargoflow_core::{ClientId, TenantId, UserId};

use crate::{Permission, Role, RoleCatalog, RoleName, UserType};

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<UserId> for PrincipalId {
    fn from(value: UserId) -> Self {
        Self(*value.as_uuid())
    }
}

impl From<PrincipalId> for UserId {
    fn from(value: PrincipalId) -> Self {
        UserId::from_uuid(value.0)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A fully resolved principal for authorization decisions.
///
/// Built once per request by the principal loader (role looked up in the
/// catalog, override/blocked grants and owned client copied from the user
/// record), then passed explicitly down the call chain. There is no
/// ambient request-attached state.
///
/// `role: None` means the user record names a role the catalog does not
/// know. That is a configuration error, and the resolver treats it as
/// deny-all rather than failing the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub role: Option<Role>,
    pub override_grants: BTreeSet<Permission>,
    pub blocked_grants: BTreeSet<Permission>,
    pub owned_client_id: Option<ClientId>,
}

impl Principal {
    /// Resolve a principal from its durable parts against the role catalog.
    pub fn load(
        principal_id: PrincipalId,
        tenant_id: TenantId,
        role_name: &RoleName,
        override_grants: impl IntoIterator<Item = Permission>,
        blocked_grants: impl IntoIterator<Item = Permission>,
        owned_client_id: Option<ClientId>,
        catalog: &RoleCatalog,
    ) -> Self {
        let role = catalog.get(role_name).cloned();
        if role.is_none() {
            tracing::error!(
                principal_id = %principal_id,
                role = %role_name,
                "principal references a role missing from the catalog; denying all"
            );
        }

        Self {
            principal_id,
            tenant_id,
            role,
            override_grants: override_grants.into_iter().collect(),
            blocked_grants: blocked_grants.into_iter().collect(),
            owned_client_id,
        }
    }

    /// The principal's user type, if its role resolved.
    pub fn user_type(&self) -> Option<UserType> {
        self.role.as_ref().map(|r| r.user_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_resolves_role_from_catalog() {
        let catalog = RoleCatalog::builtin();
        let principal = Principal::load(
            PrincipalId::new(),
            TenantId::new(),
            &RoleName::new("client"),
            [],
            [],
            Some(ClientId::new()),
            &catalog,
        );

        assert_eq!(principal.user_type(), Some(UserType::Client));
        assert!(principal.role.as_ref().unwrap().grants(Permission::ShipmentsReadOwn));
    }

    #[test]
    fn load_with_unknown_role_yields_no_role() {
        let catalog = RoleCatalog::builtin();
        let principal = Principal::load(
            PrincipalId::new(),
            TenantId::new(),
            &RoleName::new("ghost-role"),
            [],
            [],
            None,
            &catalog,
        );

        assert!(principal.role.is_none());
        assert_eq!(principal.user_type(), None);
    }
}
