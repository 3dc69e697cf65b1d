use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use cargoflow_auth::{Permission, ScopedKind, UserType};
use cargoflow_core::{AggregateId, ClientId};
use cargoflow_support::{
    CloseTicket, OpenTicket, ReplyToTicket, SupportTicket, TicketCommand, TicketId,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_ticket).get(list_tickets))
        .route("/:id", get(get_ticket))
        .route("/:id/reply", post(reply_to_ticket))
        .route("/:id/close", post(close_ticket))
}

/// Which client a ticket operation is for: client principals always act for
/// their own client; staff name one explicitly.
fn ticket_client(
    principal: &PrincipalContext,
    requested: Option<&str>,
) -> Result<ClientId, axum::response::Response> {
    if principal.principal().user_type() == Some(UserType::Client) {
        return principal.principal().owned_client_id.ok_or_else(|| {
            tracing::error!("client principal without owned client id on support write");
            errors::json_error(StatusCode::FORBIDDEN, "forbidden", "not permitted")
        });
    }

    let Some(raw) = requested else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_client_id",
            "client_id is required",
        ));
    };
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client_id"))
}

pub async fn open_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenTicketRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::SupportWrite]) {
        return resp;
    }

    let client_id = match ticket_client(&principal, body.client_id.as_deref()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let aggregate_id = AggregateId::new();
    let ticket_id = TicketId::new(aggregate_id);

    let cmd = TicketCommand::OpenTicket(OpenTicket {
        tenant_id: tenant.tenant_id(),
        ticket_id,
        client_id,
        subject: body.subject,
        body: body.body.unwrap_or_default(),
        occurred_at: Utc::now(),
    });

    match services.dispatch::<SupportTicket>(
        tenant.tenant_id(),
        aggregate_id,
        "support.ticket",
        cmd,
        |_t, id| SupportTicket::empty(TicketId::new(id)),
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

pub async fn list_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::SupportRead, Permission::SupportReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Support) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let tickets = services.support_list(tenant.tenant_id(), &scope);
    (StatusCode::OK, Json(serde_json::json!({ "tickets": tickets }))).into_response()
}

pub async fn get_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_any(
        &principal,
        &[Permission::SupportRead, Permission::SupportReadOwn],
    ) {
        return resp;
    }

    let scope = match authz::read_scope(&principal, ScopedKind::Support) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ticket id"),
    };

    match services.support_get(tenant.tenant_id(), &TicketId::new(aggregate_id), &scope) {
        Some(rm) => (StatusCode::OK, Json(serde_json::json!({ "ticket": rm }))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

/// A write against one specific ticket must be visible to the caller under
/// its support scope; foreign tickets answer 404 before any dispatch.
fn ensure_ticket_visible(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    ticket_id: TicketId,
) -> Result<(), axum::response::Response> {
    let scope = authz::read_scope(principal, ScopedKind::Support)?;
    if services
        .support_get(tenant.tenant_id(), &ticket_id, &scope)
        .is_none()
    {
        return Err(errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found"));
    }
    Ok(())
}

pub async fn reply_to_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReplyTicketRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::SupportWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ticket id"),
    };
    let ticket_id = TicketId::new(aggregate_id);

    if let Err(resp) = ensure_ticket_visible(&services, &tenant, &principal, ticket_id) {
        return resp;
    }

    let cmd = TicketCommand::ReplyToTicket(ReplyToTicket {
        tenant_id: tenant.tenant_id(),
        ticket_id,
        message: body.message,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<SupportTicket>(
        tenant.tenant_id(),
        aggregate_id,
        "support.ticket",
        cmd,
        |_t, id| SupportTicket::empty(TicketId::new(id)),
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

pub async fn close_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::ensure_all(&principal, &[Permission::SupportWrite]) {
        return resp;
    }

    let aggregate_id: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ticket id"),
    };
    let ticket_id = TicketId::new(aggregate_id);

    if let Err(resp) = ensure_ticket_visible(&services, &tenant, &principal, ticket_id) {
        return resp;
    }

    let cmd = TicketCommand::CloseTicket(CloseTicket {
        tenant_id: tenant.tenant_id(),
        ticket_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<SupportTicket>(
        tenant.tenant_id(),
        aggregate_id,
        "support.ticket",
        cmd,
        |_t, id| SupportTicket::empty(TicketId::new(id)),
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
