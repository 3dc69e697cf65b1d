//! Bearer-token authentication + per-request principal loading.
//!
//! The token carries only identity (subject + tenant). Everything an
//! authorization decision needs (role, override/blocked grants, owned
//! client) is loaded here, once, from the user directory and resolved
//! against the role catalog into an immutable `Principal` that travels in
//! request extensions. Handlers never re-fetch principal state.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use cargoflow_auth::{Principal, TokenVerifier, UserStatus};

use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub services: Arc<AppServices>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = state
        .verifier
        .verify(token, Utc::now())
        .map_err(|_e| StatusCode::UNAUTHORIZED)?;

    // Principal loader: user record + role catalog → immutable Principal.
    let Some(record) = state.services.users_get(claims.tenant_id, &claims.sub) else {
        tracing::debug!(user_id = %claims.sub, "token subject has no user record");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if record.status == UserStatus::Suspended {
        tracing::info!(user_id = %claims.sub, "suspended user attempted access");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let principal = {
        let catalog = state
            .services
            .role_catalog()
            .read()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Principal::load(
            claims.sub.into(),
            claims.tenant_id,
            &record.role,
            record.override_grants,
            record.blocked_grants,
            record.owned_client_id,
            &catalog,
        )
    };

    req.extensions_mut()
        .insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
