//! Permission resolution for a single (principal, permission) pair.
//!
//! Deny is a normal return value here, never an error. The only
//! configuration failure this layer can see, an unresolvable role, is
//! folded into deny-all so it cannot leak past the boundary as a panic
//! or a 500.

use std::collections::BTreeSet;

use crate::{Permission, Principal};

/// Decide whether `principal` holds `permission`.
///
/// Evaluation order is fixed and total:
/// 1. blocked grants deny, terminally (block wins over everything,
///    the role wildcard included);
/// 2. override grants allow, terminally;
/// 3. a missing/unresolvable role denies;
/// 4. a role carrying the wildcard allows;
/// 5. otherwise: exact membership in the role's permission set.
pub fn resolve(principal: &Principal, permission: Permission) -> bool {
    if principal.blocked_grants.contains(&permission) {
        return false;
    }
    if principal.override_grants.contains(&permission) {
        return true;
    }

    let Some(role) = principal.role.as_ref() else {
        return false;
    };

    if role.has_wildcard() {
        return true;
    }

    role.grants(permission)
}

/// The effective permission set of a principal, for display/audit.
///
/// `All` is not expanded into a list: the wildcard covers capabilities that
/// do not exist yet. Note that `resolve` still denies blocked entries under
/// a wildcard role, so callers presenting `All` should present the blocked
/// list alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissions {
    All,
    Granted(BTreeSet<Permission>),
}

impl EffectivePermissions {
    /// Canonical string forms (a single `"*"` for `All`).
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            EffectivePermissions::All => vec![Permission::Wildcard.as_str().to_string()],
            EffectivePermissions::Granted(set) => {
                set.iter().map(|p| p.as_str().to_string()).collect()
            }
        }
    }
}

/// Compute the principal's effective permission set:
/// `All` when the role carries the wildcard, otherwise
/// `(role.permissions ∪ override_grants) \ blocked_grants`.
pub fn effective_permissions(principal: &Principal) -> EffectivePermissions {
    if principal.role.as_ref().is_some_and(|r| r.has_wildcard()) {
        return EffectivePermissions::All;
    }

    let mut granted: BTreeSet<Permission> = principal
        .role
        .as_ref()
        .map(|r| r.permissions.clone())
        .unwrap_or_default();
    granted.extend(principal.override_grants.iter().copied());
    granted.retain(|p| !principal.blocked_grants.contains(p));

    EffectivePermissions::Granted(granted)
}
