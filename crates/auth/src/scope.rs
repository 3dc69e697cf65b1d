//! Resource scoping: "all records" vs "own records only".
//!
//! Every data-access collaborator listing or reading a scoped resource kind
//! must ask `scope_for` first and apply the returned scope as an additional
//! filter predicate. Ownership filtering happens nowhere else.

use serde::Serialize;
use thiserror::Error;

use cargoflow_core::ClientId;

use crate::{Permission, Principal, UserType, resolve};

/// Resource kinds that define an own-scoped read variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopedKind {
    Shipments,
    Tracking,
    Invoices,
    Support,
}

impl ScopedKind {
    pub fn read(self) -> Permission {
        match self {
            ScopedKind::Shipments => Permission::ShipmentsRead,
            ScopedKind::Tracking => Permission::TrackingRead,
            ScopedKind::Invoices => Permission::InvoicesRead,
            ScopedKind::Support => Permission::SupportRead,
        }
    }

    pub fn read_own(self) -> Permission {
        match self {
            ScopedKind::Shipments => Permission::ShipmentsReadOwn,
            ScopedKind::Tracking => Permission::TrackingReadOwn,
            ScopedKind::Invoices => Permission::InvoicesReadOwn,
            ScopedKind::Support => Permission::SupportReadOwn,
        }
    }
}

/// Query-shape decision: no restriction, or restrict to one owning client.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Unrestricted,
    OwnedBy(ClientId),
}

impl Scope {
    /// Whether a record owned by `owner` is visible under this scope.
    pub fn permits(&self, owner: Option<ClientId>) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::OwnedBy(client_id) => owner == Some(*client_id),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Own-scoped access was selected but the principal has no owned client.
    /// This is a hard configuration error: the request must be denied, never
    /// answered unrestricted (a severe access-control bug) or empty.
    #[error("own-scoped access selected for a principal without an owned client id")]
    MissingOwnedClient,
}

/// Decide the scope for `principal` reading resources of `kind`.
///
/// Client-type principals that hold only the own-scoped read variant get
/// `OwnedBy(their client)`. Everyone else (staff, clients holding the
/// unscoped read, principals the gate already rejected) gets
/// `Unrestricted`.
pub fn scope_for(principal: &Principal, kind: ScopedKind) -> Result<Scope, ScopeError> {
    let restricted = principal.user_type() == Some(UserType::Client);
    if restricted && !resolve(principal, kind.read()) && resolve(principal, kind.read_own()) {
        match principal.owned_client_id {
            Some(client_id) => Ok(Scope::OwnedBy(client_id)),
            None => {
                tracing::error!(
                    principal_id = %principal.principal_id,
                    "own-scoped principal has no owned client id; denying"
                );
                Err(ScopeError::MissingOwnedClient)
            }
        }
    } else {
        Ok(Scope::Unrestricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, RoleCatalog, RoleName};
    use cargoflow_core::TenantId;

    fn principal(role: &str, owned: Option<ClientId>) -> Principal {
        Principal::load(
            PrincipalId::new(),
            TenantId::new(),
            &RoleName::new(role.to_string()),
            [],
            [],
            owned,
            &RoleCatalog::builtin(),
        )
    }

    #[test]
    fn client_with_own_read_only_is_scoped_to_its_client() {
        let client_id = ClientId::new();
        let p = principal("client", Some(client_id));

        assert_eq!(
            scope_for(&p, ScopedKind::Shipments).unwrap(),
            Scope::OwnedBy(client_id)
        );
    }

    #[test]
    fn client_granted_unscoped_read_is_unrestricted() {
        let mut p = principal("client", Some(ClientId::new()));
        p.override_grants.insert(Permission::ShipmentsRead);

        assert_eq!(
            scope_for(&p, ScopedKind::Shipments).unwrap(),
            Scope::Unrestricted
        );
    }

    #[test]
    fn staff_is_unrestricted() {
        let p = principal("operations", None);
        assert_eq!(
            scope_for(&p, ScopedKind::Invoices).unwrap(),
            Scope::Unrestricted
        );
    }

    #[test]
    fn own_scope_without_owned_client_is_a_configuration_error() {
        let p = principal("client", None);
        assert_eq!(
            scope_for(&p, ScopedKind::Tracking).unwrap_err(),
            ScopeError::MissingOwnedClient
        );
    }

    #[test]
    fn blocked_own_read_falls_back_to_unrestricted_scope() {
        // With tracking:read:own blocked, the own-branch is not selected;
        // the gate is what rejects such a request outright.
        let mut p = principal("client", Some(ClientId::new()));
        p.blocked_grants.insert(Permission::TrackingReadOwn);

        assert_eq!(
            scope_for(&p, ScopedKind::Tracking).unwrap(),
            Scope::Unrestricted
        );
    }

    #[test]
    fn scope_permits_matches_ownership() {
        let client_id = ClientId::new();
        let scope = Scope::OwnedBy(client_id);

        assert!(scope.permits(Some(client_id)));
        assert!(!scope.permits(Some(ClientId::new())));
        assert!(!scope.permits(None));
        assert!(Scope::Unrestricted.permits(None));
    }
}
