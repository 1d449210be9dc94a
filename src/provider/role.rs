//! The `vaultgrafanacloud_secret_role` resource: a role under a backend
//! mount, stored at `<backend>/roles/<name>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::interface::{Resource, ResourceState};
use crate::provider::path::{backend_from_path, role_name_from_path, role_path};
use crate::provider::schema::{
    role_schema, DEFAULT_BACKEND_PATH, DEFAULT_MAX_TTL_SECONDS, DEFAULT_TTL_SECONDS,
};
use crate::provider::{ProviderError, ROLE_RESOURCE};
use crate::vault::VaultClient;

fn default_backend() -> String {
    DEFAULT_BACKEND_PATH.to_string()
}

fn default_ttl() -> Option<u64> {
    Some(DEFAULT_TTL_SECONDS)
}

fn default_max_ttl() -> Option<u64> {
    Some(DEFAULT_MAX_TTL_SECONDS)
}

/// Desired or observed configuration of a role.
///
/// Both leases default to 300 seconds when not given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Mount path of the owning backend.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub name: String,
    /// Grafana Cloud authorization level of issued keys, e.g. `Viewer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_role: Option<String>,
    #[serde(default = "default_ttl", skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(default = "default_max_ttl", skip_serializing_if = "Option::is_none")]
    pub max_ttl_seconds: Option<u64>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: String::new(),
            gc_role: None,
            ttl_seconds: default_ttl(),
            max_ttl_seconds: default_max_ttl(),
        }
    }
}

impl RoleConfig {
    /// Role with the default lease settings.
    pub fn new(backend: &str, name: &str, gc_role: &str) -> Self {
        Self {
            backend: backend.to_string(),
            name: name.to_string(),
            gc_role: Some(gc_role.to_string()),
            ..Self::default()
        }
    }

    fn backend_path(&self) -> String {
        let backend = self.backend.trim_matches('/');
        if backend.is_empty() {
            default_backend()
        } else {
            backend.to_string()
        }
    }

    /// Identifier the role will have once created.
    pub fn path(&self) -> String {
        role_path(&self.backend_path(), &self.name)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        let missing = role_schema().missing_required(|name| match name {
            "name" => !self.name.is_empty(),
            "gc_role" => self.gc_role.as_deref().is_some_and(|r| !r.is_empty()),
            _ => true,
        });
        if !missing.is_empty() {
            return Err(ProviderError::Validation(format!(
                "missing required attributes for {}: {}",
                ROLE_RESOURCE,
                missing.join(", ")
            )));
        }
        if self.name.contains('/') {
            return Err(ProviderError::Validation(format!(
                "role name {:?} must not contain '/'",
                self.name
            )));
        }
        Ok(())
    }

    /// The request body for the role path: exactly the fields that are set.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut data = Map::new();
        if let Some(gc_role) = &self.gc_role {
            data.insert("gc_role".into(), Value::from(gc_role.as_str()));
        }
        if let Some(ttl) = self.ttl_seconds {
            data.insert("ttl_seconds".into(), Value::from(ttl));
        }
        if let Some(max_ttl) = self.max_ttl_seconds {
            data.insert("max_ttl_seconds".into(), Value::from(max_ttl));
        }
        data
    }

    fn apply(&mut self, data: &Map<String, Value>) -> Result<(), ProviderError> {
        if let Some(value) = data.get("gc_role") {
            self.gc_role = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => {
                    return Err(ProviderError::StateField {
                        field: "gc_role",
                        reason: format!("expected a string, got {}", other),
                    })
                }
            };
        }
        if let Some(value) = data.get("ttl_seconds") {
            self.ttl_seconds = seconds_value("ttl_seconds", value)?;
        }
        if let Some(value) = data.get("max_ttl_seconds") {
            self.max_ttl_seconds = seconds_value("max_ttl_seconds", value)?;
        }
        Ok(())
    }
}

/// Lease durations come back as JSON numbers, or as numeric strings from
/// older plugin builds.
fn seconds_value(field: &'static str, value: &Value) -> Result<Option<u64>, ProviderError> {
    let invalid = || ProviderError::StateField {
        field,
        reason: format!("expected a non-negative integer, got {}", value),
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_u64().map(Some).ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Tracked state of a role: the `<backend>/roles/<name>` identifier plus
/// config. `backend` and `name` are derived from the identifier on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub config: RoleConfig,
}

impl RoleState {
    pub fn new(config: RoleConfig) -> Self {
        Self { id: None, config }
    }
}

impl ResourceState for RoleState {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }
}

/// Lifecycle of roles under Grafana Cloud backends.
pub struct SecretRole {
    client: VaultClient,
}

impl SecretRole {
    pub fn new(client: VaultClient) -> Self {
        Self { client }
    }

    fn require_id(state: &RoleState) -> Result<String, ProviderError> {
        state
            .id
            .clone()
            .ok_or(ProviderError::MissingIdentifier(ROLE_RESOURCE))
    }

    async fn write_role(&self, role_path: &str, config: &RoleConfig) -> Result<(), ProviderError> {
        self.client
            .write(role_path, &config.to_payload())
            .await
            .map_err(|source| ProviderError::RoleWrite {
                path: role_path.to_string(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl Resource for SecretRole {
    type State = RoleState;

    fn type_name(&self) -> &'static str {
        ROLE_RESOURCE
    }

    async fn create(&self, state: &mut RoleState) -> Result<(), ProviderError> {
        state.config.validate()?;
        let role_path = state.config.path();

        debug!("Writing {:?}", role_path);
        self.write_role(&role_path, &state.config).await?;
        state.id = Some(role_path.clone());
        debug!("Wrote {:?}", role_path);

        self.read(state).await
    }

    async fn read(&self, state: &mut RoleState) -> Result<(), ProviderError> {
        let role_path = Self::require_id(state)?;
        debug!("Reading {:?}", role_path);

        let name = role_name_from_path(&role_path).map_err(|source| {
            ProviderError::InvalidIdentifier {
                id: role_path.clone(),
                source,
            }
        })?;
        let backend = backend_from_path(&role_path).map_err(|source| {
            ProviderError::InvalidIdentifier {
                id: role_path.clone(),
                source,
            }
        })?;
        state.config.name = name.to_string();
        state.config.backend = backend.to_string();

        let secret = self
            .client
            .read(&role_path)
            .await
            .map_err(|source| ProviderError::RoleRead {
                path: role_path.clone(),
                source,
            })?;
        debug!("Read {:?}", role_path);

        let Some(secret) = secret else {
            warn!("{:?} not found, removing from state", role_path);
            state.id = None;
            return Ok(());
        };
        state.config.apply(&secret.data)
    }

    /// Rewrites the role and reads it back.
    async fn update(&self, state: &mut RoleState) -> Result<(), ProviderError> {
        let role_path = Self::require_id(state)?;
        debug!("Updating {:?}", role_path);
        self.write_role(&role_path, &state.config).await?;
        debug!("Updated {:?}", role_path);

        self.read(state).await
    }

    /// Deletes the role. A role Vault reports as absent counts as deleted.
    async fn delete(&self, state: &mut RoleState) -> Result<(), ProviderError> {
        let role_path = Self::require_id(state)?;
        debug!("Deleting {:?}", role_path);
        match self.client.delete(&role_path).await {
            Ok(_) => {
                debug!("Deleted grafana cloud secret role {:?}", role_path);
                state.id = None;
                Ok(())
            }
            Err(source) if source.is_not_found() => {
                debug!("{:?} not found, removing from state", role_path);
                state.id = None;
                Ok(())
            }
            Err(source) => Err(ProviderError::RoleDelete {
                path: role_path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_role_uses_default_leases() {
        let config = RoleConfig::new("grafana-cloud", "viewer-role", "Viewer");
        assert_eq!(config.path(), "grafana-cloud/roles/viewer-role");
        assert_eq!(
            Value::Object(config.to_payload()),
            json!({ "gc_role": "Viewer", "ttl_seconds": 300, "max_ttl_seconds": 300 })
        );
    }

    #[test]
    fn test_leases_default_when_omitted() {
        let config: RoleConfig =
            serde_json::from_str(r#"{"name":"viewer-role","gc_role":"Viewer"}"#).unwrap();
        assert_eq!(config.backend, "grafana-cloud");
        assert_eq!(
            Value::Object(config.to_payload()),
            json!({ "gc_role": "Viewer", "ttl_seconds": 300, "max_ttl_seconds": 300 })
        );

        let config = RoleConfig {
            gc_role: Some("Editor".into()),
            ..RoleConfig::default()
        };
        assert_eq!(config.ttl_seconds, Some(300));
        assert_eq!(config.max_ttl_seconds, Some(300));
    }

    #[test]
    fn test_payload_skips_unset_fields() {
        let config = RoleConfig {
            gc_role: Some("Admin".into()),
            ttl_seconds: None,
            max_ttl_seconds: None,
            ..RoleConfig::default()
        };
        assert_eq!(
            Value::Object(config.to_payload()),
            json!({ "gc_role": "Admin" })
        );
    }

    #[test]
    fn test_backend_slashes_trimmed() {
        let config = RoleConfig::new("/teams/gc/", "editor", "Editor");
        assert_eq!(config.path(), "teams/gc/roles/editor");
    }

    #[test]
    fn test_validate() {
        assert!(RoleConfig::new("gc", "viewer", "Viewer").validate().is_ok());

        let missing = RoleConfig {
            name: "viewer".into(),
            ..RoleConfig::default()
        };
        assert!(matches!(missing.validate(), Err(ProviderError::Validation(m)) if m.contains("gc_role")));

        let nested = RoleConfig::new("gc", "a/b", "Viewer");
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_apply_accepts_numeric_strings() {
        let mut config = RoleConfig::new("gc", "viewer", "Viewer");
        let data = json!({ "ttl_seconds": "60", "max_ttl_seconds": 120 });
        config.apply(data.as_object().unwrap()).unwrap();
        assert_eq!(config.ttl_seconds, Some(60));
        assert_eq!(config.max_ttl_seconds, Some(120));
        assert_eq!(config.gc_role.as_deref(), Some("Viewer"));
    }

    #[test]
    fn test_apply_rejects_negative_ttl() {
        let mut config = RoleConfig::default();
        let data = json!({ "ttl_seconds": -5 });
        let err = config.apply(data.as_object().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::StateField {
                field: "ttl_seconds",
                ..
            }
        ));
    }
}
