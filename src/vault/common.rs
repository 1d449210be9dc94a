//! Wire types and response handling shared by the logical and sys APIs.

use crate::vault::VaultError;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A response body from the logical API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Secret {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    /// Flat field map of the secret or config entry.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Body of a `sys/mounts/<path>` registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MountInput {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// An entry of `sys/mounts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MountOutput {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub accessor: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Checks the HTTP response from Vault. On success returns the JSON body,
/// or `None` when the response had no content; otherwise builds an error
/// from the `errors` array Vault sends back.
pub async fn check_response(
    resp: Response,
    method: &str,
    url: &str,
) -> Result<Option<Value>, VaultError> {
    let status = resp.status();
    if status.is_success() {
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str::<Value>(&body)
            .map_err(|e| VaultError::ParseError(format!("Failed to parse response: {}", e)))?;
        return Ok(Some(value));
    }

    let body = resp.text().await.unwrap_or_default();
    Err(VaultError::HttpStatus {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Renders Vault's `{"errors": [...]}` body as a bullet list.
fn error_message(body: &str) -> String {
    if let Ok(val) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = val.get("errors").and_then(|v| v.as_array()) {
            let lines: Vec<String> = errors
                .iter()
                .filter_map(|e| e.as_str())
                .map(|e| format!("* {}", e))
                .collect();
            if !lines.is_empty() {
                return lines.join("\n");
            }
        }
    }
    if body.is_empty() {
        "<no response body>".to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_from_errors_array() {
        let body = json!({ "errors": ["permission denied", "missing capability"] }).to_string();
        assert_eq!(error_message(&body), "* permission denied\n* missing capability");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
        assert_eq!(error_message(""), "<no response body>");
        assert_eq!(error_message(r#"{"errors":[]}"#), r#"{"errors":[]}"#);
    }

    #[test]
    fn test_secret_tolerates_null_data() {
        let secret: Secret = serde_json::from_value(json!({
            "request_id": "abc",
            "data": null,
            "warnings": ["deprecated field"]
        }))
        .unwrap();
        assert!(secret.data.is_empty());
        assert_eq!(secret.warnings.unwrap().len(), 1);
    }

    #[test]
    fn test_mount_input_wire_shape() {
        let input = MountInput {
            mount_type: "vault-plugin-secrets-grafanacloud".into(),
            description: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({ "type": "vault-plugin-secrets-grafanacloud" })
        );
    }
}
