use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use cargoflow_api::app::services::AppServices;
use cargoflow_auth::AccessClaims;
use cargoflow_core::{TenantId, UserId};

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let (app, services) = cargoflow_api::app::build_parts(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    /// Seed the first admin and wait for the users projection to catch up.
    async fn bootstrap_admin(&self, tenant_id: TenantId) -> UserId {
        let user_id = self
            .services
            .bootstrap_admin(tenant_id, "admin@forwarder.example", "Admin")
            .expect("bootstrap admin");

        for _ in 0..100 {
            if self.services.users_get(tenant_id, &user_id).is_some() {
                return user_id;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("admin user did not become visible in projection");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, user_id: UserId) -> String {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        tenant_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// The API is intentionally eventual-consistent (command path vs projection
/// update). Poll briefly until the given endpoint answers 200.
async fn wait_for_ok(client: &reqwest::Client, url: &str, token: &str) -> Value {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("endpoint did not become available: {url}");
}

async fn wait_for_list_len(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    key: &str,
    expected: usize,
) -> Value {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: Value = res.json().await.unwrap();
            if body[key].as_array().map(|a| a.len()) == Some(expected) {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{url} never reported {expected} {key}");
}

async fn create_id(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    body: Value,
) -> String {
    let res = client
        .post(url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED, "POST {url}");
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public_and_protected_routes_require_auth() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_for_unknown_user_is_unauthorized() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    // Valid signature, but no user record behind the subject.
    let token = mint_jwt(jwt_secret, TenantId::new(), UserId::new());
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_principals_see_only_their_own_records() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let admin_id = srv.bootstrap_admin(tenant_id).await;
    let admin_token = mint_jwt(jwt_secret, tenant_id, admin_id);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &admin_token).await;

    // Two clients, one shipment each.
    let client_a = create_id(
        &client,
        &format!("{}/clients", srv.base_url),
        &admin_token,
        json!({"name": "Indus Textiles Ltd"}),
    )
    .await;
    let client_b = create_id(
        &client,
        &format!("{}/clients", srv.base_url),
        &admin_token,
        json!({"name": "Mekong Electronics"}),
    )
    .await;

    let shipment_a = create_id(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        json!({
            "client_id": client_a,
            "reference": "SHP-A-1",
            "origin": "Karachi",
            "destination": "Rotterdam",
        }),
    )
    .await;
    let shipment_b = create_id(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        json!({
            "client_id": client_b,
            "reference": "SHP-B-1",
            "origin": "Ho Chi Minh City",
            "destination": "Hamburg",
        }),
    )
    .await;

    wait_for_list_len(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        "shipments",
        2,
    )
    .await;

    // A portal user for client A.
    let user_a = create_id(
        &client,
        &format!("{}/users", srv.base_url),
        &admin_token,
        json!({
            "email": "ops@industextiles.example",
            "display_name": "Client A Ops",
            "role": "client",
            "owned_client_id": client_a,
        }),
    )
    .await;
    let user_a: UserId = user_a.parse().unwrap();
    let client_token = mint_jwt(jwt_secret, tenant_id, user_a);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &client_token).await;

    // Own-scoped list: exactly client A's shipment.
    let body = wait_for_list_len(
        &client,
        &format!("{}/shipments", srv.base_url),
        &client_token,
        "shipments",
        1,
    )
    .await;
    assert_eq!(body["shipments"][0]["reference"], "SHP-A-1");

    // Own detail read works; a foreign one reads as missing, not forbidden.
    let res = client
        .get(format!("{}/shipments/{}", srv.base_url, shipment_a))
        .bearer_auth(&client_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/shipments/{}", srv.base_url, shipment_b))
        .bearer_auth(&client_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // No shipments:write on the client role.
    let res = client
        .post(format!("{}/shipments", srv.base_url))
        .bearer_auth(&client_token)
        .json(&json!({
            "client_id": client_a,
            "reference": "SHP-A-2",
            "origin": "Karachi",
            "destination": "Antwerp",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "not permitted");
}

#[tokio::test]
async fn tracking_projects_status_and_terminal_shipments_reject_events() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let admin_id = srv.bootstrap_admin(tenant_id).await;
    let admin_token = mint_jwt(jwt_secret, tenant_id, admin_id);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &admin_token).await;

    let client_a = create_id(
        &client,
        &format!("{}/clients", srv.base_url),
        &admin_token,
        json!({"name": "Indus Textiles Ltd"}),
    )
    .await;
    let shipment = create_id(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        json!({
            "client_id": client_a,
            "reference": "SHP-T-1",
            "origin": "Shanghai",
            "destination": "Rotterdam",
        }),
    )
    .await;
    wait_for_list_len(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        "shipments",
        1,
    )
    .await;

    let tracking_url = format!("{}/shipments/{}/tracking", srv.base_url, shipment);

    for (code, advanced) in [
        ("order_confirmed", true),
        ("picked_up", true),
        ("delayed", false),
        ("delivered", true),
    ] {
        let res = client
            .post(&tracking_url)
            .bearer_auth(&admin_token)
            .json(&json!({"code": code}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "code {code}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status_advanced"], advanced, "code {code}");
    }

    // Terminal shipment: further events fail the whole write.
    let res = client
        .post(&tracking_url)
        .bearer_auth(&admin_token)
        .json(&json!({"code": "delayed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "terminal_state");

    // History carries the status changes next to their triggering events.
    let history = wait_for_ok(
        &client,
        &format!("{}/shipments/{}/history", srv.base_url, shipment),
        &admin_token,
    )
    .await;
    let events = history["events"].as_array().unwrap();
    assert!(
        events
            .iter()
            .any(|e| e["event_type"] == "shipments.shipment.status_advanced"
                && e["payload"]["StatusAdvanced"]["to"] == "delivered")
    );
}

#[tokio::test]
async fn blocked_grant_denies_even_role_granted_reads() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let admin_id = srv.bootstrap_admin(tenant_id).await;
    let admin_token = mint_jwt(jwt_secret, tenant_id, admin_id);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &admin_token).await;

    let client_a = create_id(
        &client,
        &format!("{}/clients", srv.base_url),
        &admin_token,
        json!({"name": "Indus Textiles Ltd"}),
    )
    .await;
    let shipment = create_id(
        &client,
        &format!("{}/shipments", srv.base_url),
        &admin_token,
        json!({
            "client_id": client_a,
            "reference": "SHP-G-1",
            "origin": "Karachi",
            "destination": "Rotterdam",
        }),
    )
    .await;

    let user_a = create_id(
        &client,
        &format!("{}/users", srv.base_url),
        &admin_token,
        json!({
            "email": "ops@industextiles.example",
            "display_name": "Client A Ops",
            "role": "client",
            "owned_client_id": client_a,
        }),
    )
    .await;
    let client_token = mint_jwt(jwt_secret, tenant_id, user_a.parse().unwrap());
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &client_token).await;

    let tracking_url = format!("{}/shipments/{}/tracking", srv.base_url, shipment);
    wait_for_ok(&client, &tracking_url, &client_token).await;

    // Block the role-granted tracking read for this one user.
    let res = client
        .post(format!("{}/users/{}/blocked", srv.base_url, user_a))
        .bearer_auth(&admin_token)
        .json(&json!({"permission": "tracking:read:own"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The block wins over the role grant; shipments stay readable.
    for _ in 0..100 {
        let res = client
            .get(&tracking_url)
            .bearer_auth(&client_token)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::FORBIDDEN {
            let shipment_res = client
                .get(format!("{}/shipments/{}", srv.base_url, shipment))
                .bearer_auth(&client_token)
                .send()
                .await
                .unwrap();
            assert_eq!(shipment_res.status(), StatusCode::OK);
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("blocked grant never took effect");
}

#[tokio::test]
async fn suspended_users_cannot_authenticate() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let admin_id = srv.bootstrap_admin(tenant_id).await;
    let admin_token = mint_jwt(jwt_secret, tenant_id, admin_id);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &admin_token).await;

    let user_id = create_id(
        &client,
        &format!("{}/users", srv.base_url),
        &admin_token,
        json!({
            "email": "temp@forwarder.example",
            "display_name": "Temp Ops",
            "role": "operations",
        }),
    )
    .await;
    let user_token = mint_jwt(jwt_secret, tenant_id, user_id.parse().unwrap());
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &user_token).await;

    let res = client
        .post(format!("{}/users/{}/suspend", srv.base_url, user_id))
        .bearer_auth(&admin_token)
        .json(&json!({"reason": "offboarding"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // A still-valid token stops working once the suspension projects.
    for _ in 0..100 {
        let res = client
            .get(format!("{}/whoami", srv.base_url))
            .bearer_auth(&user_token)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::UNAUTHORIZED {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("suspension never took effect");
}

#[tokio::test]
async fn system_roles_are_protected_and_custom_roles_are_not() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();

    let admin_id = srv.bootstrap_admin(tenant_id).await;
    let admin_token = mint_jwt(jwt_secret, tenant_id, admin_id);
    wait_for_ok(&client, &format!("{}/whoami", srv.base_url), &admin_token).await;

    let res = client
        .delete(format!("{}/rbac/roles/admin", srv.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .post(format!("{}/rbac/roles", srv.base_url))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": "accounting",
            "user_type": "staff",
            "permissions": ["invoices:read", "invoices:write"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .delete(format!("{}/rbac/roles/accounting", srv.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}
