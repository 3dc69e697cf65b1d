//! Route-side authorization helpers.
//!
//! Thin wrappers over the gate and scope filter that convert failures into
//! ready HTTP responses. Denies answer with a deliberately generic body; the
//! precise cause (missing permission, configuration error) goes to the logs
//! only, at different levels, so operators can tell them apart and callers
//! cannot.

use axum::response::Response;

use cargoflow_auth::{Permission, Scope, ScopedKind, require_all, require_any, scope_for};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Require every listed permission (ALL-of gate) before an operation.
pub fn ensure_all(principal: &PrincipalContext, required: &[Permission]) -> Result<(), Response> {
    require_all(principal.principal(), required).map_err(errors::forbidden)
}

/// Require at least one listed permission (ANY-of gate) before an operation.
pub fn ensure_any(principal: &PrincipalContext, required: &[Permission]) -> Result<(), Response> {
    require_any(principal.principal(), required).map_err(errors::forbidden)
}

/// Decide the read scope for a scoped resource kind.
///
/// Call the gate first; this assumes the read itself was already allowed.
pub fn read_scope(principal: &PrincipalContext, kind: ScopedKind) -> Result<Scope, Response> {
    scope_for(principal.principal(), kind).map_err(errors::scope_configuration)
}
