use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cargoflow_auth::{AuthzError, ScopeError};
use cargoflow_infra::command_dispatcher::DispatchError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Gate deny. The missing permission is logged for diagnosability; the
/// response body stays generic so callers learn nothing about the grant
/// landscape.
pub fn forbidden(err: AuthzError) -> axum::response::Response {
    tracing::warn!("authorization denied: {err}");
    json_error(StatusCode::FORBIDDEN, "forbidden", "not permitted")
}

/// Scope configuration error (own-scoped principal without an owned client).
/// Deliberately indistinguishable from an ordinary deny on the wire, loud in
/// the logs.
pub fn scope_configuration(err: ScopeError) -> axum::response::Response {
    tracing::error!("scope configuration error: {err}");
    json_error(StatusCode::FORBIDDEN, "forbidden", "not permitted")
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::TerminalState(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "terminal_state", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "not permitted"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
    }
}
