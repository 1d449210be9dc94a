//! Shared fixtures for the integration tests.
//!
//! Lifecycle tests run against a `wiremock` server standing in for Vault.
//! The helpers here build a provider pointed at that server with the same
//! client settings `Provider::configure` uses, but with millisecond retry
//! waits so failure paths stay fast.
//!
//! [`VaultFixture`] starts a real dev-mode Vault for the ignored live tests.

#![allow(dead_code)]

use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use vault_grafanacloud::vault::{ClientConfig, VaultClient};
use vault_grafanacloud::{Provider, ProviderConfig};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "root";

/// Set up logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer() // This ensures output goes to both stdout and test output
        .try_init();
}

pub fn client_config(address: &str) -> ClientConfig {
    ClientConfig {
        address: address.to_string(),
        max_retries: 2,
        min_retry_wait: Duration::from_millis(1),
        max_retry_wait: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
        read_your_writes: true,
        namespace: None,
    }
}

/// Provider authenticated with [`TEST_TOKEN`] against the mock server.
pub fn test_provider(server: &MockServer) -> Provider {
    let mut client = VaultClient::new(client_config(&server.uri())).unwrap();
    client.set_clone_headers(true);
    client.set_clone_token(true);
    client.set_token(TEST_TOKEN);
    Provider::from_client(client)
}

/// Random mount path, so tests never collide on a shared server.
pub fn random_backend() -> String {
    format!("tf-test-grafanacloud-{}", uuid::Uuid::new_v4().simple())
}

pub struct VaultFixture {
    _container: ContainerAsync<GenericImage>,
    pub address: String,
}

impl VaultFixture {
    /// Dev-mode Vault on a random host port, root token [`TEST_TOKEN`].
    pub async fn new() -> Self {
        let container = GenericImage::new("hashicorp/vault", "1.18.4")
            .with_exposed_port(8200.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Vault server started!"))
            .with_env_var("VAULT_DEV_ROOT_TOKEN_ID", TEST_TOKEN)
            .with_env_var("VAULT_DEV_LISTEN_ADDRESS", "0.0.0.0:8200")
            .with_cmd(vec!["server", "-dev", "-dev-root-token-id=root"])
            .start()
            .await
            .unwrap();

        let port = container.get_host_port_ipv4(8200).await.unwrap();

        VaultFixture {
            _container: container,
            address: format!("http://127.0.0.1:{}", port),
        }
    }

    pub async fn provider(&self) -> Provider {
        let config = ProviderConfig {
            address: Some(self.address.clone()),
            token: Some(TEST_TOKEN.to_string()),
        };
        Provider::configure(&config).await.unwrap()
    }
}
