//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (event store/bus, projections,
//!   dispatcher, tracking intake, role catalog)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::middleware;
use crate::verifier::Hs256TokenVerifier;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let (app, _services) = build_parts(jwt_secret).await;
    app
}

/// Build the router plus a handle to the wired services.
///
/// The handle is what seed scripts and black-box tests use to provision the
/// first users/clients without an HTTP bootstrap endpoint.
pub async fn build_parts(jwt_secret: String) -> (Router, Arc<services::AppServices>) {
    let services = Arc::new(services::build_services());

    let auth_state = middleware::AuthState {
        verifier: Arc::new(Hs256TokenVerifier::new(jwt_secret.as_bytes())),
        services: services.clone(),
    };

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected);

    (app, services)
}
