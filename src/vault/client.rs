//! Client implementation for Vault API interactions.
//!
//! This module provides a client for making HTTP requests to the Vault API
//! with token authentication, namespace scoping, bounded retries and
//! read-your-writes consistency against replicated clusters.

use crate::vault::common::{check_response, MountInput, MountOutput, Secret};
use crate::vault::VaultError;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, Url,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_VAULT_ADDRESS: &str = "VAULT_ADDR";
pub const ENV_VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";

pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const INDEX_HEADER: &str = "X-Vault-Index";

/// Settings a [`VaultClient`] is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Vault API URL, e.g., "http://127.0.0.1:8200".
    pub address: String,
    /// Extra attempts after the first one for retryable failures.
    pub max_retries: u32,
    pub min_retry_wait: Duration,
    pub max_retry_wait: Duration,
    pub timeout: Duration,
    /// Replay the last seen `X-Vault-Index` so reads observe earlier writes.
    pub read_your_writes: bool,
    pub namespace: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let address = std::env::var(ENV_VAULT_ADDRESS)
            .ok()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let namespace = std::env::var(ENV_VAULT_NAMESPACE)
            .ok()
            .filter(|ns| !ns.is_empty());
        Self {
            address,
            max_retries: 2,
            min_retry_wait: Duration::from_millis(1000),
            max_retry_wait: Duration::from_millis(1500),
            timeout: Duration::from_secs(60),
            read_your_writes: false,
            namespace,
        }
    }
}

impl ClientConfig {
    fn retry_wait(&self, attempt: u32) -> Duration {
        let wait = self.min_retry_wait.saturating_mul(attempt);
        wait.clamp(self.min_retry_wait, self.max_retry_wait.max(self.min_retry_wait))
    }
}

/// Client for interacting with the Vault HTTP API.
#[derive(Debug)]
pub struct VaultClient {
    /// Base URL of the Vault server, without a trailing slash
    addr: String,
    config: ClientConfig,
    token: Option<String>,
    /// HTTP client for making requests
    client: Client,
    /// Custom headers to add to requests
    custom_headers: HeaderMap,
    clone_headers: bool,
    clone_token: bool,
    /// Last replication index seen, shared by every clone of this client
    replication_state: Arc<Mutex<Option<String>>>,
}

impl VaultClient {
    /// Creates a new VaultClient from the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, VaultError> {
        let addr = validate_address(&config.address)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VaultError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        let mut vault_client = Self {
            addr,
            token: None,
            client,
            custom_headers: HeaderMap::new(),
            clone_headers: false,
            clone_token: false,
            replication_state: Arc::new(Mutex::new(None)),
            config,
        };
        if let Some(namespace) = vault_client.config.namespace.clone() {
            vault_client.set_namespace(&namespace);
        }
        Ok(vault_client)
    }

    pub fn address(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current token, `None` if unset or empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    /// Adds a custom header to the client.
    ///
    /// Invalid header names or values are ignored.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let (Ok(header_name), Ok(header_value)) =
            (HeaderName::from_str(name), HeaderValue::from_str(value))
        {
            self.custom_headers.insert(header_name, header_value);
        }
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.custom_headers
    }

    /// Scopes every request to a Vault Enterprise namespace.
    pub fn set_namespace(&mut self, namespace: &str) {
        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            self.custom_headers.remove(NAMESPACE_HEADER);
        } else {
            self.add_header(NAMESPACE_HEADER, namespace);
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.custom_headers
            .get(NAMESPACE_HEADER)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_clone_headers(&mut self, enabled: bool) {
        self.clone_headers = enabled;
    }

    pub fn set_clone_token(&mut self, enabled: bool) {
        self.clone_token = enabled;
    }

    /// Creates a new handle on the same server and transport.
    ///
    /// Custom headers carry over only with clone-headers enabled and the
    /// token only with clone-token enabled. The clone inherits both flags.
    pub fn clone_client(&self) -> VaultClient {
        VaultClient {
            addr: self.addr.clone(),
            config: self.config.clone(),
            token: if self.clone_token {
                self.token.clone()
            } else {
                None
            },
            client: self.client.clone(),
            custom_headers: if self.clone_headers {
                self.custom_headers.clone()
            } else {
                HeaderMap::new()
            },
            clone_headers: self.clone_headers,
            clone_token: self.clone_token,
            replication_state: Arc::clone(&self.replication_state),
        }
    }

    /// Clone of this client scoped to `namespace`.
    pub fn with_namespace(&self, namespace: &str) -> VaultClient {
        let mut client = self.clone_client();
        client.set_namespace(namespace);
        client
    }

    /// Reads `path` from the logical API. A 404 is not an error: it means
    /// there is nothing at that path and yields `None`.
    pub async fn read(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        match self.request(Method::GET, path, None).await {
            Ok(body) => body.map(parse_secret).transpose(),
            Err(e) if e.is_not_found() => {
                debug!("Nothing found at {}", path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes a flat field map to `path`.
    pub async fn write(
        &self,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<Option<Secret>, VaultError> {
        let body = Value::Object(data.clone());
        self.request(Method::PUT, path, Some(&body))
            .await?
            .map(parse_secret)
            .transpose()
    }

    /// Deletes `path` from the logical API.
    pub async fn delete(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        self.request(Method::DELETE, path, None)
            .await?
            .map(parse_secret)
            .transpose()
    }

    /// Enables a secrets engine at `path`.
    pub async fn mount(&self, path: &str, input: &MountInput) -> Result<(), VaultError> {
        let body = serde_json::to_value(input)?;
        self.request(Method::POST, &format!("sys/mounts/{}", path), Some(&body))
            .await?;
        Ok(())
    }

    /// Disables the secrets engine at `path`.
    pub async fn unmount(&self, path: &str) -> Result<(), VaultError> {
        self.request(Method::DELETE, &format!("sys/mounts/{}", path), None)
            .await?;
        Ok(())
    }

    /// Lists enabled secrets engines, keyed by mount path (with trailing `/`).
    pub async fn list_mounts(&self) -> Result<HashMap<String, MountOutput>, VaultError> {
        let body = self
            .request(Method::GET, "sys/mounts", None)
            .await?
            .unwrap_or_default();
        // Newer servers nest the table under "data", older ones put it at the top level.
        let table = match body.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => body,
        };
        let Value::Object(entries) = table else {
            return Ok(HashMap::new());
        };
        let mut mounts = HashMap::new();
        for (path, entry) in entries {
            if !entry.is_object() || entry.get("type").is_none() {
                continue;
            }
            mounts.insert(path, serde_json::from_value(entry)?);
        }
        Ok(mounts)
    }

    /// Makes a request to the Vault API, retrying transport errors, 5xx and
    /// 412 responses up to the configured retry budget.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, VaultError> {
        let url = format!("{}/v1/{}", self.addr, path.trim_start_matches('/'));
        let mut attempt = 0;
        loop {
            match self.send(method.clone(), &url, body).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let wait = self.config.retry_wait(attempt);
                    warn!(
                        "{} {} failed (attempt {}), retrying in {:?}: {}",
                        method, url, attempt, wait, e
                    );
                    tokio::time::sleep(wait).await;
                }
                result => return result,
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, VaultError> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), url);

        if let Some(token) = self.token() {
            request = request.header(TOKEN_HEADER, token);
        }

        for (name, value) in self.custom_headers.iter() {
            request = request.header(name, value);
        }

        if self.config.read_your_writes {
            if let Some(index) = self.replication_index() {
                request = request.header(INDEX_HEADER, index);
            }
        }

        if let Some(json_body) = body {
            request = request.json(json_body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::Connection(format!("Request failed: {}", e)))?;

        if self.config.read_your_writes {
            if let Some(index) = response
                .headers()
                .get(INDEX_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                self.record_replication_index(index);
            }
        }

        check_response(response, method.as_str(), url).await
    }

    fn replication_index(&self) -> Option<String> {
        self.replication_state
            .lock()
            .ok()
            .and_then(|state| state.clone())
    }

    fn record_replication_index(&self, index: &str) {
        if let Ok(mut state) = self.replication_state.lock() {
            *state = Some(index.to_string());
        }
    }
}

fn parse_secret(body: Value) -> Result<Secret, VaultError> {
    Ok(serde_json::from_value(body)?)
}

fn validate_address(address: &str) -> Result<String, VaultError> {
    let url = Url::parse(address)
        .map_err(|e| VaultError::InvalidAddress(address.to_string(), e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(VaultError::InvalidAddress(
            address.to_string(),
            format!("unsupported scheme {:?}", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(VaultError::InvalidAddress(
            address.to_string(),
            "missing host".to_string(),
        ));
    }
    Ok(address.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(address: &str) -> ClientConfig {
        ClientConfig {
            address: address.to_string(),
            max_retries: 2,
            min_retry_wait: Duration::from_millis(1),
            max_retry_wait: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            read_your_writes: false,
            namespace: None,
        }
    }

    #[test]
    fn test_rejects_malformed_address() {
        let result = VaultClient::new(config_for("not a url"));
        assert!(matches!(result, Err(VaultError::InvalidAddress(_, _))));

        let result = VaultClient::new(config_for("ftp://vault.example.com"));
        assert!(matches!(result, Err(VaultError::InvalidAddress(_, _))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = VaultClient::new(config_for("http://127.0.0.1:8200/")).unwrap();
        assert_eq!(client.address(), "http://127.0.0.1:8200");
    }

    #[test]
    fn test_retry_wait_is_clamped() {
        let config = ClientConfig {
            min_retry_wait: Duration::from_millis(1000),
            max_retry_wait: Duration::from_millis(1500),
            ..config_for("http://127.0.0.1:8200")
        };
        assert_eq!(config.retry_wait(1), Duration::from_millis(1000));
        assert_eq!(config.retry_wait(2), Duration::from_millis(1500));
        assert_eq!(config.retry_wait(7), Duration::from_millis(1500));
    }

    #[test]
    fn test_clone_respects_flags() {
        let mut client = VaultClient::new(config_for("http://127.0.0.1:8200")).unwrap();
        client.set_token("s.root");
        client.set_namespace("team-a");

        let bare = client.clone_client();
        assert_eq!(bare.token(), None);
        assert_eq!(bare.namespace(), None);

        client.set_clone_headers(true);
        client.set_clone_token(true);
        let full = client.clone_client();
        assert_eq!(full.token(), Some("s.root"));
        assert_eq!(full.namespace(), Some("team-a"));

        let scoped = client.with_namespace("/team-b/");
        assert_eq!(scoped.namespace(), Some("team-b"));
        assert_eq!(client.namespace(), Some("team-a"));
    }

    #[tokio::test]
    async fn test_read_sends_token_and_parses_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/grafana-cloud/config"))
            .and(header("X-Vault-Token", "s.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "url": "http://localhost" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = VaultClient::new(config_for(&server.uri())).unwrap();
        client.set_token("s.test");
        let secret = client.read("grafana-cloud/config").await.unwrap().unwrap();
        assert_eq!(secret.data["url"], "http://localhost");
    }

    #[tokio::test]
    async fn test_read_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/missing/config"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
            .mount(&server)
            .await;

        let client = VaultClient::new(config_for(&server.uri())).unwrap();
        assert!(client.read("missing/config").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_puts_flat_map() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/grafana-cloud/roles/viewer"))
            .and(body_json(json!({ "gc_role": "Viewer", "ttl_seconds": 300 })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = VaultClient::new(config_for(&server.uri())).unwrap();
        let mut data = Map::new();
        data.insert("gc_role".into(), json!("Viewer"));
        data.insert("ttl_seconds".into(), json!(300));
        assert!(client
            .write("grafana-cloud/roles/viewer", &data)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_within_budget() {
        crate::init_test_logging();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/flaky/config"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "errors": ["Vault is sealed"]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = VaultClient::new(config_for(&server.uri())).unwrap();
        let err = client.read("flaky/config").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("* Vault is sealed"));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sys/mounts/grafana-cloud"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": ["path is already in use at grafana-cloud/"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = VaultClient::new(config_for(&server.uri())).unwrap();
        let input = MountInput {
            mount_type: "vault-plugin-secrets-grafanacloud".into(),
            description: String::new(),
        };
        let err = client.mount("grafana-cloud", &input).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_read_your_writes_replays_index() {
        crate::init_test_logging();
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/grafana-cloud/config"))
            .respond_with(ResponseTemplate::new(204).insert_header("X-Vault-Index", "idx-42"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/grafana-cloud/config"))
            .and(header("X-Vault-Index", "idx-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            read_your_writes: true,
            ..config_for(&server.uri())
        };
        let client = VaultClient::new(config).unwrap();
        client
            .write("grafana-cloud/config", &Map::new())
            .await
            .unwrap();
        // A clone shares the replication state with its parent.
        let clone = client.clone_client();
        assert!(clone.read("grafana-cloud/config").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_mounts_reads_data_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "r-1",
                "data": {
                    "grafana-cloud/": { "type": "vault-plugin-secrets-grafanacloud", "accessor": "gc_1" },
                    "secret/": { "type": "kv" }
                }
            })))
            .mount(&server)
            .await;

        let client = VaultClient::new(config_for(&server.uri())).unwrap();
        let mounts = client.list_mounts().await.unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(
            mounts["grafana-cloud/"].mount_type,
            "vault-plugin-secrets-grafanacloud"
        );
    }
}
