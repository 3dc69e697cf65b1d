use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use cargoflow_auth::{Permission, ScopedKind};
use cargoflow_core::AggregateId;
use cargoflow_shipments::{
    BookShipment, CancelShipment, OverrideStatus, Shipment, ShipmentCommand, ShipmentId,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(book_shipment).get(list_shipments))
        .route("/:id", get(get_shipment))
        .route("/:id/history", get(shipment_history))
        .route("/:id/status", post(override_status))
        .route("/:id/cancel", post(cancel_shipment))
        .merge(super::tracking::router())
}

pub async fn book_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::BookShipmentRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ShipmentsWrite]) {
        return resp;
    }

    let client_id = match body.client_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client_id"),
    };

    let aggregate_id = AggregateId::new();
    let shipment_id = ShipmentId::new(aggregate_id);

    let cmd = ShipmentCommand::BookShipment(BookShipment {
        tenant_id: tenant.tenant_id(),
        shipment_id,
        client_id,
        reference: body.reference,
        origin: body.origin,
        destination: body.destination,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Shipment>(
        tenant.tenant_id(),
        aggregate_id,
        "shipments.shipment",
        cmd,
        |_t, id| Shipment::empty(ShipmentId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": aggregate_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::ShipmentsRead, Permission::ShipmentsReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Shipments) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let shipments = services.shipments_list(tenant.tenant_id(), &scope);
    (StatusCode::OK, Json(serde_json::json!({ "shipments": shipments }))).into_response()
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::ShipmentsRead, Permission::ShipmentsReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Shipments) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };

    // A scope-hidden shipment answers exactly like a missing one.
    match services.shipments_get(tenant.tenant_id(), &ShipmentId::new(aggregate_id), &scope) {
        Some(rm) => (StatusCode::OK, Json(serde_json::json!({ "shipment": rm }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

/// Stored event stream for a shipment: every status change alongside the
/// tracking event that caused it.
pub async fn shipment_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::ShipmentsRead, Permission::ShipmentsReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Shipments) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };
    let shipment_id = ShipmentId::new(aggregate_id);

    if services
        .shipments_get(tenant.tenant_id(), &shipment_id, &scope)
        .is_none()
    {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found");
    }

    match services.shipment_history(tenant.tenant_id(), shipment_id) {
        Ok(events) => {
            let events: Vec<_> = events
                .into_iter()
                .map(|e| {
                    serde_json::json!({
                        "event_id": e.event_id,
                        "sequence_number": e.sequence_number,
                        "event_type": e.event_type,
                        "occurred_at": e.occurred_at,
                        "payload": e.payload,
                    })
                })
                .collect();
            (StatusCode::OK, Json(serde_json::json!({ "events": events }))).into_response()
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
    }
}

pub async fn override_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OverrideStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ShipmentsWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };
    let shipment_id = ShipmentId::new(aggregate_id);

    let cmd = ShipmentCommand::OverrideStatus(OverrideStatus {
        tenant_id: tenant.tenant_id(),
        shipment_id,
        status: body.status,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Shipment>(
        tenant.tenant_id(),
        aggregate_id,
        "shipments.shipment",
        cmd,
        |_t, sid| Shipment::empty(ShipmentId::new(sid)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": aggregate_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelShipmentRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::ShipmentsWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };

    let cmd = ShipmentCommand::CancelShipment(CancelShipment {
        tenant_id: tenant.tenant_id(),
        shipment_id: ShipmentId::new(aggregate_id),
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Shipment>(
        tenant.tenant_id(),
        aggregate_id,
        "shipments.shipment",
        cmd,
        |_t, sid| Shipment::empty(ShipmentId::new(sid)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": aggregate_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
