//! Authorization gate: composition primitives over the resolver.
//!
//! These are the checks operation boundaries call before doing anything
//! else. They are pure (no IO, no panics, no principal/role mutation),
//! and the error carries enough to log precisely while the HTTP layer
//! answers with a deliberately generic body.

use thiserror::Error;

use crate::{Permission, Principal, resolve};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    MissingPermission(Permission),

    #[error("forbidden: none of the required permissions granted")]
    NoneGranted,
}

/// Pass only if every permission resolves to allow.
///
/// All entries are evaluated: blocked grants can appear anywhere in the
/// list, so there is no safe early exit on allow. The first failing
/// permission is the one reported.
pub fn require_all(principal: &Principal, required: &[Permission]) -> Result<(), AuthzError> {
    let mut missing = None;
    for &permission in required {
        if !resolve(principal, permission) && missing.is_none() {
            missing = Some(permission);
        }
    }

    match missing {
        Some(permission) => Err(AuthzError::MissingPermission(permission)),
        None => Ok(()),
    }
}

/// Pass if at least one permission resolves to allow.
///
/// Short-circuits on the first allow (safe here: a later blocked entry
/// cannot retract an earlier definitive allow).
pub fn require_any(principal: &Principal, required: &[Permission]) -> Result<(), AuthzError> {
    if required.iter().any(|&p| resolve(principal, p)) {
        Ok(())
    } else {
        Err(AuthzError::NoneGranted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, RoleCatalog, RoleName};
    use cargoflow_core::TenantId;

    fn client_principal() -> Principal {
        Principal::load(
            PrincipalId::new(),
            TenantId::new(),
            &RoleName::new("client"),
            [],
            [],
            None,
            &RoleCatalog::builtin(),
        )
    }

    #[test]
    fn require_all_passes_iff_every_permission_resolves() {
        let principal = client_principal();

        require_all(
            &principal,
            &[Permission::ShipmentsReadOwn, Permission::TrackingReadOwn],
        )
        .unwrap();

        let err = require_all(
            &principal,
            &[Permission::ShipmentsReadOwn, Permission::ShipmentsWrite],
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::MissingPermission(Permission::ShipmentsWrite));
    }

    #[test]
    fn require_all_reports_first_failing_permission() {
        let principal = client_principal();
        let err = require_all(
            &principal,
            &[
                Permission::ClientsWrite,
                Permission::ShipmentsWrite,
                Permission::ShipmentsReadOwn,
            ],
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::MissingPermission(Permission::ClientsWrite));
    }

    #[test]
    fn require_all_on_empty_list_passes() {
        let principal = client_principal();
        require_all(&principal, &[]).unwrap();
    }

    #[test]
    fn require_any_passes_on_any_grant() {
        let principal = client_principal();

        require_any(
            &principal,
            &[Permission::ShipmentsRead, Permission::ShipmentsReadOwn],
        )
        .unwrap();

        let err = require_any(
            &principal,
            &[Permission::ShipmentsRead, Permission::ShipmentsWrite],
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::NoneGranted);
    }

    #[test]
    fn require_any_on_empty_list_rejects() {
        let principal = client_principal();
        assert_eq!(require_any(&principal, &[]), Err(AuthzError::NoneGranted));
    }

    #[test]
    fn blocked_entry_fails_require_all_regardless_of_position() {
        let mut principal = client_principal();
        principal.blocked_grants.insert(Permission::TrackingReadOwn);

        let err = require_all(
            &principal,
            &[Permission::ShipmentsReadOwn, Permission::TrackingReadOwn],
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuthzError::MissingPermission(Permission::TrackingReadOwn)
        );
    }
}
