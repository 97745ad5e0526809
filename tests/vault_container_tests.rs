//! End-to-end tests against a real Vault dev server using testcontainers.
//!
//! These tests start a `hashicorp/vault` container in dev mode (KV v2 mounted
//! at `secret/`), serve the gatekeeper over TCP and rotate the secret live.
//! They need Docker and are ignored by default.
//!
//! Run with: `cargo test --test vault_container_tests -- --ignored`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use reqwest::{Client, StatusCode};
use serde_json::json;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

use gatekeeper::config::{Config, VaultSettings};
use gatekeeper::gate::CidrRule;
use gatekeeper::secrets::SecretSourceKind;
use gatekeeper::{AppState, build_router, routes};

const ROOT_TOKEN: &str = "gatekeeper-test-root";
const SECRET_NAME: &str = "auth-secret-token";

/// Vault dev-mode container configuration
struct VaultContainer {
    port: u16,
}

impl VaultContainer {
    const IMAGE: &'static str = "hashicorp/vault";
    const TAG: &'static str = "1.15";
    const PORT: u16 = 8200;

    async fn start() -> (ContainerAsync<GenericImage>, Self) {
        // GenericImage methods must come before ImageExt methods
        let container = GenericImage::new(Self::IMAGE, Self::TAG)
            .with_exposed_port(Self::PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Development mode should NOT be used"))
            .with_env_var("VAULT_DEV_ROOT_TOKEN_ID", ROOT_TOKEN)
            .with_env_var("VAULT_DEV_LISTEN_ADDRESS", "0.0.0.0:8200")
            .with_env_var("SKIP_SETCAP", "true")
            .with_startup_timeout(Duration::from_secs(120))
            .start()
            .await
            .expect("Failed to start Vault container");

        let port = container
            .get_host_port_ipv4(Self::PORT)
            .await
            .expect("Failed to get Vault port");

        (container, Self { port })
    }

    fn address(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Write `value` as the current version of the test secret.
    async fn write_secret(&self, client: &Client, value: &str) {
        let response = client
            .post(format!("{}/v1/secret/data/{SECRET_NAME}", self.address()))
            .header("X-Vault-Token", ROOT_TOKEN)
            .json(&json!({ "data": { "value": value } }))
            .send()
            .await
            .expect("Failed to write secret");
        assert!(
            response.status().is_success(),
            "Vault write failed: {}",
            response.status()
        );
    }
}

/// Serve the guarded app on an ephemeral port.
async fn serve(state: AppState) -> String {
    let auth = Router::new().route("/auth/ping", get(|| async { "pong" }));
    let app = build_router(state.clone()).merge(routes::guard(auth, &state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{addr}")
}

async fn ping(client: &Client, base_url: &str, token: &str) -> StatusCode {
    client
        .get(format!("{base_url}/auth/ping"))
        .header("X-Auth-Token", token)
        .send()
        .await
        .expect("request failed")
        .status()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_live_rotation_from_vault() {
    let (_container, vault) = VaultContainer::start().await;
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    vault.write_secret(&client, "first-generation").await;

    let config = Config {
        host: "127.0.0.1".to_string(),
        allowed_ips: vec![CidrRule::parse("127.0.0.0/8").unwrap()],
        vault: Some(VaultSettings {
            address: vault.address(),
            token: ROOT_TOKEN.to_string(),
            mount: "secret".to_string(),
            field: "value".to_string(),
        }),
        log_level: "warn".to_string(),
        ..Config::default()
    };

    let state = AppState::from_config(config).unwrap();
    let record = state.start().await;
    assert_eq!(record.source, SecretSourceKind::Vault);

    let base_url = serve(state.clone()).await;

    // Peer address 127.0.0.1 is allow-listed; the token decides.
    assert_eq!(ping(&client, &base_url, "first-generation").await, StatusCode::OK);
    assert_eq!(ping(&client, &base_url, "nope").await, StatusCode::FORBIDDEN);

    vault.write_secret(&client, "second-generation").await;
    state.rotation().trigger();

    let mut rotated = false;
    for _ in 0..50 {
        if ping(&client, &base_url, "second-generation").await == StatusCode::OK {
            rotated = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(rotated, "new secret never became active");
    assert_eq!(
        ping(&client, &base_url, "first-generation").await,
        StatusCode::FORBIDDEN
    );

    state.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_secret_falls_back_to_static_default() {
    let (_container, vault) = VaultContainer::start().await;

    let config = Config {
        secret_name: "does-not-exist".to_string(),
        secret_env_var: "GATEKEEPER_CONTAINER_TEST_UNSET".to_string(),
        vault: Some(VaultSettings {
            address: vault.address(),
            token: ROOT_TOKEN.to_string(),
            mount: "secret".to_string(),
            field: "value".to_string(),
        }),
        ..Config::default()
    };

    let state = AppState::from_config(config).unwrap();
    let record = state.start().await;
    assert_eq!(record.source, SecretSourceKind::StaticDefault);
    assert!(state.secret.is_populated());

    state.shutdown().await;
}
