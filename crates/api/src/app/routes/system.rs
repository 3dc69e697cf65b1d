use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use cargoflow_auth::effective_permissions;

use crate::context::{PrincipalContext, TenantContext};

/// Liveness probe (unauthenticated).
pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// Who the request is acting as, after principal loading.
pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let p = principal.principal();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "principal_id": p.principal_id.to_string(),
            "tenant_id": tenant.tenant_id().to_string(),
            "role": p.role.as_ref().map(|r| r.name.as_str().to_string()),
            "user_type": p.role.as_ref().map(|r| r.user_type),
            "owned_client_id": p.owned_client_id.map(|c| c.to_string()),
            "effective_permissions": effective_permissions(p).as_strings(),
            "blocked": p.blocked_grants.iter().map(|b| b.as_str()).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}
