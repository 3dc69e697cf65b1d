use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use cargoflow_auth::{Permission, ScopedKind};
use cargoflow_core::AggregateId;
use cargoflow_shipments::ShipmentId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

/// Mounted inside the shipments router (`/shipments/:id/tracking`).
pub fn router() -> Router {
    Router::new().route(
        "/:id/tracking",
        post(record_tracking_event).get(list_tracking_events),
    )
}

/// Record a carrier tracking event. The shipment's status projection is part
/// of the same write: on success the response reports whether the status
/// advanced, and a terminal shipment rejects the event outright.
pub async fn record_tracking_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordTrackingEventRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::TrackingWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };

    match services.record_tracking_event(
        tenant.tenant_id(),
        ShipmentId::new(aggregate_id),
        body.code,
        body.note,
        Utc::now(),
    ) {
        Ok(committed) => {
            let status_advanced = committed
                .iter()
                .any(|e| e.event_type == "shipments.shipment.status_advanced");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "shipment_id": aggregate_id.to_string(),
                    "events_committed": committed.len(),
                    "status_advanced": status_advanced,
                })),
            )
                .into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_tracking_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::TrackingRead, Permission::TrackingReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Tracking) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment id"),
    };

    match services.shipments_get(tenant.tenant_id(), &ShipmentId::new(aggregate_id), &scope) {
        Some(rm) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "shipment_id": aggregate_id.to_string(),
                "status": rm.status,
                "tracking": rm.tracking,
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}
