use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use cargoflow_auth::Permission;
use cargoflow_clients::{ArchiveClient, Client, ClientCommand, ContactInfo, RegisterClient};
use cargoflow_core::{AggregateId, ClientId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_client).get(list_clients))
        .route("/:id", get(get_client))
        .route("/:id/archive", post(archive_client))
}

pub async fn register_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterClientRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ClientsWrite]) {
        return resp;
    }

    let client_id = ClientId::new();

    let contact = ContactInfo {
        email: body.email,
        phone: body.phone,
        address: body.address,
    };

    let cmd = ClientCommand::RegisterClient(RegisterClient {
        tenant_id: tenant.tenant_id(),
        client_id,
        name: body.name,
        contact: Some(contact),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Client>(
        tenant.tenant_id(),
        client_id.into(),
        "clients.client",
        cmd,
        |_t, id| Client::empty(id.into()),
    ) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": client_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ClientsRead]) {
        return resp;
    }

    let clients = services.clients_list(tenant.tenant_id());
    (StatusCode::OK, Json(serde_json::json!({ "clients": clients }))).into_response()
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ClientsRead]) {
        return resp;
    }

    let client_id: ClientId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client id"),
    };

    match services.clients_get(tenant.tenant_id(), &client_id) {
        Some(rm) => (StatusCode::OK, Json(serde_json::json!({ "client": rm }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub async fn archive_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ClientsWrite]) {
        return resp;
    }

    let client_id: ClientId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client id"),
    };

    let cmd = ClientCommand::ArchiveClient(ArchiveClient {
        tenant_id: tenant.tenant_id(),
        client_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Client>(
        tenant.tenant_id(),
        AggregateId::from(client_id),
        "clients.client",
        cmd,
        |_t, id| Client::empty(id.into()),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": client_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
