#[tokio::main]
async fn main() {
    cargoflow_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let (app, services) = cargoflow_api::app::build_parts(jwt_secret).await;

    // Dev bootstrap: seed one admin user so the instance is reachable.
    // Production provisioning goes through proper seed tooling instead.
    if let Ok(email) = std::env::var("BOOTSTRAP_ADMIN_EMAIL") {
        let tenant_id = cargoflow_core::TenantId::new();
        match services.bootstrap_admin(tenant_id, &email, "Bootstrap Admin") {
            Ok(user_id) => tracing::info!(
                %tenant_id,
                %user_id,
                "bootstrap admin created; mint tokens with this subject"
            ),
            Err(e) => tracing::error!("bootstrap admin creation failed: {e:?}"),
        }
    }

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
