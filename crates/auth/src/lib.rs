//! `cargoflow-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. It owns the
//! closed permission vocabulary, the role catalog, the permission resolver,
//! the authorization gate and the resource scope filter, plus the `User`
//! aggregate that is the durable source for per-request principal loading.

pub mod claims;
pub mod gate;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod scope;
pub mod user;

pub use claims::{AccessClaims, TokenValidationError, TokenVerifier, validate_claims};
pub use gate::{AuthzError, require_all, require_any};
pub use permissions::{ALL_PERMISSIONS, ParsePermissionError, Permission};
pub use principal::{Principal, PrincipalId};
pub use resolver::{EffectivePermissions, effective_permissions, resolve};
pub use roles::{Role, RoleCatalog, RoleError, RoleName, UserType};
pub use scope::{Scope, ScopeError, ScopedKind, scope_for};
pub use user::{User, UserCommand, UserEvent, UserStatus};
