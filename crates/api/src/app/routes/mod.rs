use axum::{Router, routing::get};

pub mod clients;
pub mod invoices;
pub mod rbac;
pub mod shipments;
pub mod support;
pub mod system;
pub mod tracking;
pub mod users;

/// Protected route tree (auth middleware is layered on by the app builder).
pub fn router() -> Router {
    Router::new()
        .nest("/shipments", shipments::router())
        .nest("/invoices", invoices::router())
        .nest("/support", support::router())
        .nest("/clients", clients::router())
        .nest("/users", users::router())
        .nest("/rbac", rbac::router())
        .route("/whoami", get(system::whoami))
}
