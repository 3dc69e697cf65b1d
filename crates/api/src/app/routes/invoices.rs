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
use cargoflow_invoicing::{
    ChargeLine, Invoice, InvoiceCommand, InvoiceId, IssueInvoice, RegisterPayment, VoidInvoice,
};
use cargoflow_shipments::ShipmentId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(register_payment))
        .route("/:id/void", post(void_invoice))
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::InvoicesWrite]) {
        return resp;
    }

    let client_id = match body.client_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client_id"),
    };

    let shipment_agg: AggregateId = match body.shipment_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid shipment_id"),
    };

    let due_date = match chrono::DateTime::parse_from_rfc3339(&body.due_date) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_due_date", "due_date must be RFC3339");
        }
    };

    let aggregate_id = AggregateId::new();
    let invoice_id = InvoiceId::new(aggregate_id);

    let lines: Vec<ChargeLine> = body
        .lines
        .into_iter()
        .enumerate()
        .map(|(idx, l)| ChargeLine {
            line_no: (idx as u32) + 1,
            description: l.description,
            amount: l.amount,
        })
        .collect();

    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        client_id,
        shipment_id: ShipmentId::new(shipment_agg),
        lines,
        due_date,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Invoice>(
        tenant.tenant_id(),
        aggregate_id,
        "invoicing.invoice",
        cmd,
        |_t, id| Invoice::empty(InvoiceId::new(id)),
    ) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": aggregate_id.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::InvoicesRead, Permission::InvoicesReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Invoices) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let invoices = services.invoices_list(tenant.tenant_id(), &scope);
    (StatusCode::OK, Json(serde_json::json!({ "invoices": invoices }))).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::InvoicesRead, Permission::InvoicesReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Invoices) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    match services.invoices_get(tenant.tenant_id(), &InvoiceId::new(aggregate_id), &scope) {
        Some(rm) => (StatusCode::OK, Json(serde_json::json!({ "invoice": rm }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

pub async fn register_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RegisterPaymentRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::InvoicesWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let cmd = InvoiceCommand::RegisterPayment(RegisterPayment {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(aggregate_id),
        amount: body.amount,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Invoice>(
        tenant.tenant_id(),
        aggregate_id,
        "invoicing.invoice",
        cmd,
        |_t, id| Invoice::empty(InvoiceId::new(id)),
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

pub async fn void_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::InvoicesWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let cmd = InvoiceCommand::VoidInvoice(VoidInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(aggregate_id),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Invoice>(
        tenant.tenant_id(),
        aggregate_id,
        "invoicing.invoice",
        cmd,
        |_t, id| Invoice::empty(InvoiceId::new(id)),
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
