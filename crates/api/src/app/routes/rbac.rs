//! Role and permission administration.
//!
//! The permission vocabulary is closed; these endpoints expose it and the
//! role catalog for auditing, and let `roles:write` holders manage custom
//! roles. System-defined roles cannot be redefined or removed.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use cargoflow_auth::{ALL_PERMISSIONS, Permission, Role, RoleError, RoleName};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles).post(define_role))
        .route("/roles/:name", get(get_role).delete(remove_role))
        .route("/permissions", get(list_permissions))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::RolesRead]) {
        return resp;
    }

    let catalog = match services.role_catalog().read() {
        Ok(c) => c,
        Err(_) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock"),
    };

    let roles: Vec<&Role> = catalog.iter().collect();
    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::RolesRead]) {
        return resp;
    }

    let catalog = match services.role_catalog().read() {
        Ok(c) => c,
        Err(_) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock"),
    };

    match catalog.get(&RoleName::new(name)) {
        Some(role) => (StatusCode::OK, Json(serde_json::json!({ "role": role }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
    }
}

pub async fn define_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::DefineRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::RolesWrite]) {
        return resp;
    }

    if body.name.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_role", "role name cannot be empty");
    }

    let role = Role::new(body.name.clone(), body.user_type, body.permissions.clone());

    let mut catalog = match services.role_catalog().write() {
        Ok(c) => c,
        Err(_) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock"),
    };

    match catalog.define(role) {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "role": body.role_name() })),
        )
            .into_response(),
        Err(RoleError::SystemRole(name)) => errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "system_role",
            format!("system role '{name}' cannot be redefined"),
        ),
        Err(RoleError::NotFound(_)) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found")
        }
    }
}

pub async fn remove_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::RolesWrite]) {
        return resp;
    }

    let mut catalog = match services.role_catalog().write() {
        Ok(c) => c,
        Err(_) => return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock"),
    };

    match catalog.remove(&RoleName::new(name)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(RoleError::SystemRole(name)) => errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "system_role",
            format!("system role '{name}' cannot be removed"),
        ),
        Err(RoleError::NotFound(_)) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not found")
        }
    }
}

pub async fn list_permissions(
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::RolesRead]) {
        return resp;
    }

    let permissions: Vec<&str> = ALL_PERMISSIONS.iter().map(|p| p.as_str()).collect();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "permissions": permissions })),
    )
        .into_response()
}
