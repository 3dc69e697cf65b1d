use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use cargoflow_auth::{
    EffectivePermissions, Permission, Principal, RoleName, User, UserCommand, effective_permissions,
    user::{
        ActivateUser, BlockGrant, ChangeRole, CreateUser, GrantOverride, RevokeOverride,
        SuspendUser, UnblockGrant,
    },
};
use cargoflow_core::{AggregateId, UserId};
use cargoflow_infra::projections::UserReadModel;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/:id", get(get_user))
        .route("/:id/role", post(change_role))
        .route("/:id/grants", post(grant_override))
        .route("/:id/grants/revoke", post(revoke_override))
        .route("/:id/blocked", post(block_grant))
        .route("/:id/blocked/lift", post(unblock_grant))
        .route("/:id/suspend", post(suspend_user))
        .route("/:id/activate", post(activate_user))
}

fn parse_user_id(id: &str) -> Result<UserId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

fn actor_id(principal: &PrincipalContext) -> UserId {
    principal.principal().principal_id.into()
}

/// The actor's effective permissions, flattened for the in-aggregate
/// escalation check (wildcard stays a single sentinel).
fn actor_grants(principal: &PrincipalContext) -> Vec<Permission> {
    match effective_permissions(principal.principal()) {
        EffectivePermissions::All => vec![Permission::Wildcard],
        EffectivePermissions::Granted(set) => set.into_iter().collect(),
    }
}

fn dispatch_user_command(
    services: &AppServices,
    tenant: &TenantContext,
    user_id: UserId,
    cmd: UserCommand,
) -> axum::response::Response {
    match services.dispatch::<User>(
        tenant.tenant_id(),
        AggregateId::from(user_id),
        "auth.user",
        cmd,
        |_t, id| User::empty(id.into()),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": user_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let owned_client_id = match body.owned_client_id.as_deref() {
        None => None,
        Some(raw) => match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid owned_client_id");
            }
        },
    };

    let user_id = UserId::new();
    let cmd = UserCommand::Create(CreateUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        email: body.email,
        display_name: body.display_name,
        role: RoleName::new(body.role),
        owned_client_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<User>(
        tenant.tenant_id(),
        AggregateId::from(user_id),
        "auth.user",
        cmd,
        |_t, id| User::empty(id.into()),
    ) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": user_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersRead]) {
        return resp;
    }

    let users = services.users_list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response()
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersRead]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(record) = services.users_get(tenant.tenant_id(), &user_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found");
    };

    // Resolve the record the same way the middleware would, so operators see
    // the permissions this user actually gets.
    let resolved = {
        let catalog = match services.role_catalog().read() {
            Ok(c) => c,
            Err(_) => {
                return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock");
            }
        };
        resolve_record(tenant, &record, &catalog)
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user": record,
            "effective_permissions": resolved.0,
            "blocked": resolved.1,
        })),
    )
        .into_response()
}

fn resolve_record(
    tenant: TenantContext,
    record: &UserReadModel,
    catalog: &cargoflow_auth::RoleCatalog,
) -> (Vec<String>, Vec<String>) {
    let principal = Principal::load(
        record.user_id.into(),
        tenant.tenant_id(),
        &record.role,
        record.override_grants.iter().copied(),
        record.blocked_grants.iter().copied(),
        record.owned_client_id,
        catalog,
    );
    let effective = effective_permissions(&principal).as_strings();
    let blocked = principal
        .blocked_grants
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    (effective, blocked)
}

pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite, Permission::RolesRead]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let role = RoleName::new(body.role);
    {
        // Reject role names the catalog does not know, before the write.
        let catalog = match services.role_catalog().read() {
            Ok(c) => c,
            Err(_) => {
                return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", "catalog lock");
            }
        };
        if catalog.get(&role).is_none() {
            return errors::json_error(StatusCode::BAD_REQUEST, "unknown_role", "unknown role");
        }
    }

    let cmd = UserCommand::ChangeRole(ChangeRole {
        tenant_id: tenant.tenant_id(),
        user_id,
        role,
        actor_id: actor_id(&principal),
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn grant_override(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::GrantOverride(GrantOverride {
        tenant_id: tenant.tenant_id(),
        user_id,
        permission: body.permission,
        actor_id: actor_id(&principal),
        actor_grants: actor_grants(&principal),
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn revoke_override(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::RevokeOverride(RevokeOverride {
        tenant_id: tenant.tenant_id(),
        user_id,
        permission: body.permission,
        actor_id: actor_id(&principal),
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn block_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::BlockGrant(BlockGrant {
        tenant_id: tenant.tenant_id(),
        user_id,
        permission: body.permission,
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn unblock_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::UnblockGrant(UnblockGrant {
        tenant_id: tenant.tenant_id(),
        user_id,
        permission: body.permission,
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SuspendUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::Suspend(SuspendUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::UsersWrite]) {
        return resp;
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::Activate(ActivateUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        occurred_at: Utc::now(),
    });

    dispatch_user_command(&services, &tenant, user_id, cmd)
}
