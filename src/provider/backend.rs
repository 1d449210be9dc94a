//! The `vaultgrafanacloud_secret_backend` resource: a mount of the Grafana
//! Cloud secrets plugin plus its `config` entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::interface::{Resource, ResourceState};
use crate::provider::schema::{backend_schema, DEFAULT_BACKEND_PATH};
use crate::provider::{ProviderError, BACKEND_RESOURCE};
use crate::vault::{MountInput, VaultClient};

/// Plugin type the backend is mounted with.
pub const MOUNT_TYPE: &str = "vault-plugin-secrets-grafanacloud";

/// Keys of the `<backend>/config` entry, in the order they are mirrored.
pub const CONFIG_FIELDS: [&str; 14] = [
    "key",
    "url",
    "organisation",
    "user",
    "prometheus_user",
    "prometheus_url",
    "loki_user",
    "loki_url",
    "tempo_user",
    "tempo_url",
    "alertmanager_user",
    "alertmanager_url",
    "graphite_user",
    "graphite_url",
];

fn default_backend() -> String {
    DEFAULT_BACKEND_PATH.to_string()
}

/// Desired or observed configuration of a backend mount.
///
/// `None` means the attribute was not set and is left out of writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Mount path. Empty means the default, `grafana-cloud`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    /// Deprecated alias of `prometheus_user`, still sent when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loki_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loki_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertmanager_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertmanager_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphite_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphite_url: Option<String>,
}

impl BackendConfig {
    /// Config with the three required Grafana Cloud settings.
    pub fn new(backend: &str, key: &str, url: &str, organisation: &str) -> Self {
        Self {
            backend: backend.to_string(),
            key: Some(key.to_string()),
            url: Some(url.to_string()),
            organisation: Some(organisation.to_string()),
            ..Self::default()
        }
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 14] {
        [
            ("key", &self.key),
            ("url", &self.url),
            ("organisation", &self.organisation),
            ("user", &self.user),
            ("prometheus_user", &self.prometheus_user),
            ("prometheus_url", &self.prometheus_url),
            ("loki_user", &self.loki_user),
            ("loki_url", &self.loki_url),
            ("tempo_user", &self.tempo_user),
            ("tempo_url", &self.tempo_url),
            ("alertmanager_user", &self.alertmanager_user),
            ("alertmanager_url", &self.alertmanager_url),
            ("graphite_user", &self.graphite_user),
            ("graphite_url", &self.graphite_url),
        ]
    }

    fn fields_mut(&mut self) -> [(&'static str, &mut Option<String>); 14] {
        [
            ("key", &mut self.key),
            ("url", &mut self.url),
            ("organisation", &mut self.organisation),
            ("user", &mut self.user),
            ("prometheus_user", &mut self.prometheus_user),
            ("prometheus_url", &mut self.prometheus_url),
            ("loki_user", &mut self.loki_user),
            ("loki_url", &mut self.loki_url),
            ("tempo_user", &mut self.tempo_user),
            ("tempo_url", &mut self.tempo_url),
            ("alertmanager_user", &mut self.alertmanager_user),
            ("alertmanager_url", &mut self.alertmanager_url),
            ("graphite_user", &mut self.graphite_user),
            ("graphite_url", &mut self.graphite_url),
        ]
    }

    /// Value of a config field by its wire name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// The mount path with surrounding slashes removed.
    pub fn mount_path(&self) -> Result<String, ProviderError> {
        if self.backend.is_empty() {
            return Ok(default_backend());
        }
        let path = self.backend.trim_matches('/');
        if path.is_empty() {
            return Err(ProviderError::Validation(format!(
                "backend {:?} is not a valid mount path",
                self.backend
            )));
        }
        Ok(path.to_string())
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        let missing = backend_schema()
            .missing_required(|name| self.get(name).is_some_and(|v| !v.is_empty()));
        if !missing.is_empty() {
            return Err(ProviderError::Validation(format!(
                "missing required attributes for {}: {}",
                BACKEND_RESOURCE,
                missing.join(", ")
            )));
        }
        self.mount_path().map(|_| ())
    }

    /// The request body for `<backend>/config`: exactly the fields that are set.
    pub fn to_payload(&self) -> Map<String, Value> {
        self.fields()
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_ref()
                    .map(|v| (name.to_string(), Value::String(v.clone())))
            })
            .collect()
    }

    /// Mirrors the fields present in `data`. Fields Vault did not return
    /// keep their current value.
    fn apply(&mut self, data: &Map<String, Value>) -> Result<(), ProviderError> {
        for (name, slot) in self.fields_mut() {
            if let Some(value) = data.get(name) {
                *slot = string_value(name, value)?;
            }
        }
        Ok(())
    }
}

fn string_value(field: &'static str, value: &Value) -> Result<Option<String>, ProviderError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(ProviderError::StateField {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

/// Tracked state of a backend: its identifier (the mount path) plus config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub config: BackendConfig,
}

impl BackendState {
    pub fn new(config: BackendConfig) -> Self {
        Self { id: None, config }
    }
}

impl ResourceState for BackendState {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

fn config_path(backend: &str) -> String {
    format!("{}/config", backend)
}

/// Lifecycle of Grafana Cloud backend mounts.
pub struct SecretBackend {
    client: VaultClient,
}

impl SecretBackend {
    pub fn new(client: VaultClient) -> Self {
        Self { client }
    }

    fn require_id(state: &BackendState) -> Result<String, ProviderError> {
        state
            .id
            .clone()
            .ok_or(ProviderError::MissingIdentifier(BACKEND_RESOURCE))
    }
}

#[async_trait]
impl Resource for SecretBackend {
    type State = BackendState;

    fn type_name(&self) -> &'static str {
        BACKEND_RESOURCE
    }

    /// Mounts the plugin, then writes its config. A failed config write
    /// leaves the mount in place with the identifier already assigned.
    async fn create(&self, state: &mut BackendState) -> Result<(), ProviderError> {
        state.config.validate()?;
        let backend = state.config.mount_path()?;

        debug!("Mounting grafana-cloud-plugin backend at {:?}", backend);
        let input = MountInput {
            mount_type: MOUNT_TYPE.to_string(),
            description: String::new(),
        };
        self.client
            .mount(&backend, &input)
            .await
            .map_err(|source| ProviderError::Mount {
                path: backend.clone(),
                source,
            })?;
        debug!("Mounted vault grafana cloud backend at {:?}", backend);
        state.id = Some(backend.clone());
        state.config.backend = backend.clone();

        let config_path = config_path(&backend);
        debug!("Writing {:?}", config_path);
        self.client
            .write(&config_path, &state.config.to_payload())
            .await
            .map_err(|source| ProviderError::ConfigWrite {
                path: config_path.clone(),
                source,
            })?;
        debug!("Wrote {:?}", config_path);

        self.read(state).await
    }

    async fn read(&self, state: &mut BackendState) -> Result<(), ProviderError> {
        let id = Self::require_id(state)?;
        state.config.backend = id.clone();

        let config_path = config_path(&id);
        debug!("Reading {:?}", config_path);
        let secret = self
            .client
            .read(&config_path)
            .await
            .map_err(|source| ProviderError::ConfigRead {
                path: config_path.clone(),
                source,
            })?;
        debug!("Read {:?}", config_path);

        let Some(secret) = secret else {
            warn!("{:?} not found, removing from state", config_path);
            state.id = None;
            return Ok(());
        };
        state.config.apply(&secret.data)
    }

    /// Overwrites the config with the fields that are set. Does not read back.
    async fn update(&self, state: &mut BackendState) -> Result<(), ProviderError> {
        let id = Self::require_id(state)?;
        let config_path = config_path(&id);
        debug!("Updating {:?}", config_path);
        self.client
            .write(&config_path, &state.config.to_payload())
            .await
            .map_err(|source| ProviderError::ConfigWrite {
                path: config_path.clone(),
                source,
            })?;
        debug!("Updated {:?}", config_path);
        Ok(())
    }

    /// Unmounts the backend. When Vault reports the mount as already gone
    /// the identifier is cleared and the error is still returned.
    async fn delete(&self, state: &mut BackendState) -> Result<(), ProviderError> {
        let id = Self::require_id(state)?;
        debug!("Unmounting vault grafana cloud backend {:?}", id);
        match self.client.unmount(&id).await {
            Ok(()) => {
                debug!("Unmounted vault grafana cloud backend {:?}", id);
                state.id = None;
                Ok(())
            }
            Err(source) if source.is_not_found() => {
                warn!("{:?} not found, removing from state", id);
                state.id = None;
                Err(ProviderError::Unmount { path: id, source })
            }
            Err(source) => Err(ProviderError::Unmount { path: id, source }),
        }
    }
}
