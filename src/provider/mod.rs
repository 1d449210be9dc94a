//! Provider configuration and the resources it manages.
//!
//! [`Provider::configure`] builds the one authenticated client a session
//! uses; the resource managers it hands out each get their own clone of it.

pub mod backend;
pub mod error;
pub mod path;
pub mod role;
pub mod schema;

pub use backend::{BackendConfig, BackendState, SecretBackend};
pub use error::ProviderError;
pub use role::{RoleConfig, RoleState, SecretRole};

use crate::vault::client::ENV_VAULT_ADDRESS;
use crate::vault::{resolve_token, ClientConfig, VaultClient};
use tracing::info;

pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";

/// Retry budget of the client every resource operation goes through.
pub const DEFAULT_MAX_HTTP_RETRIES: u32 = 2;

pub const BACKEND_RESOURCE: &str = "vaultgrafanacloud_secret_backend";
pub const ROLE_RESOURCE: &str = "vaultgrafanacloud_secret_role";

/// Provider-level settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// URL of the root of the target Vault server.
    pub address: Option<String>,
    /// Token to authenticate with; the token helper is consulted when unset.
    pub token: Option<String>,
}

impl ProviderConfig {
    /// Settings from `VAULT_ADDR` and `VAULT_TOKEN`.
    pub fn from_env() -> Self {
        Self {
            address: std::env::var(ENV_VAULT_ADDRESS).ok(),
            token: std::env::var(ENV_VAULT_TOKEN).ok(),
        }
    }
}

pub struct Provider {
    client: VaultClient,
}

impl Provider {
    /// Builds the session client: read-your-writes on, two retries, header
    /// and token cloning on, authenticated with the explicit token or the
    /// token helper's. Fails if no token can be found.
    pub async fn configure(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut client_config = ClientConfig::default();
        if let Some(address) = config.address.as_deref().filter(|a| !a.is_empty()) {
            client_config.address = address.to_string();
        }
        client_config.read_your_writes = true;
        client_config.max_retries = DEFAULT_MAX_HTTP_RETRIES;

        let mut client = VaultClient::new(client_config).map_err(ProviderError::ClientInit)?;

        // Clones made per resource must keep the namespace header and token.
        client.set_clone_headers(true);
        client.set_clone_token(true);

        let token = resolve_token(config.token.as_deref()).await?;
        if !token.is_empty() {
            client.set_token(&token);
        }
        if client.token().is_none() {
            return Err(ProviderError::NoToken);
        }

        info!("Configured Vault client for {}", client.address());
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: VaultClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    /// A provider whose requests go to the given Vault Enterprise namespace.
    pub fn with_namespace(&self, namespace: &str) -> Provider {
        Provider {
            client: self.client.with_namespace(namespace),
        }
    }

    pub fn resource_types() -> [&'static str; 2] {
        [BACKEND_RESOURCE, ROLE_RESOURCE]
    }

    pub fn secret_backend(&self) -> SecretBackend {
        SecretBackend::new(self.client.clone_client())
    }

    pub fn secret_role(&self) -> SecretRole {
        SecretRole::new(self.client.clone_client())
    }
}
