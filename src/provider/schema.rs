//! Attribute schemas of the provider and its resources.
//!
//! The schema drives required-attribute validation and tells the CLI which
//! attributes are sensitive.

use serde::Serialize;
use serde_json::{json, Value};

pub const DEFAULT_BACKEND_PATH: &str = "grafana-cloud";
pub const DEFAULT_TTL_SECONDS: u64 = 300;
pub const DEFAULT_MAX_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Int,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Value must not be echoed back to the user.
    pub sensitive: bool,
    /// Changing the value replaces the resource.
    pub force_new: bool,
    pub deprecated: bool,
    pub description: &'static str,
}

impl Attribute {
    fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: AttributeType::String,
            required: false,
            default: None,
            sensitive: false,
            force_new: false,
            deprecated: false,
            description,
        }
    }

    fn int(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: AttributeType::Int,
            ..Self::string(name, description)
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Names of required attributes for which `is_set` returns false.
    pub fn missing_required(&self, is_set: impl Fn(&str) -> bool) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.required && !is_set(a.name))
            .map(|a| a.name)
            .collect()
    }

    pub fn sensitive_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
    }
}

pub fn provider_schema() -> ResourceSchema {
    ResourceSchema {
        type_name: "provider",
        attributes: vec![
            Attribute::string("address", "URL of the root of the target Vault server.").required(),
            Attribute::string("token", "Token to use to authenticate to Vault.")
                .required()
                .sensitive(),
        ],
    }
}

pub fn backend_schema() -> ResourceSchema {
    ResourceSchema {
        type_name: super::BACKEND_RESOURCE,
        attributes: vec![
            Attribute::string(
                "backend",
                "The mount path for a backend, for example, the path given in \"$ vault secrets enable -path=grafana-cloud grafana-cloud-plugin\".",
            )
            .default_value(json!(DEFAULT_BACKEND_PATH))
            .force_new(),
            Attribute::string("key", "API key with Admin role to create user keys")
                .required()
                .sensitive(),
            Attribute::string("url", "The URL for the Grafana Cloud API").required(),
            Attribute::string("organisation", "The Organisation slug for the Grafana Cloud API")
                .required(),
            Attribute::string(
                "user",
                "(Deprecated) The User that is needed to interact with prometheus, if set this is returned alongside every issued credential",
            )
            .deprecated(),
            Attribute::string(
                "prometheus_user",
                "The User that is needed to interact with prometheus, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "prometheus_url",
                "The URL at which Prometheus can be accessed, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "loki_user",
                "The User that is needed to interact with loki, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "loki_url",
                "The URL at which Loki can be accessed, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "tempo_user",
                "The User that is needed to interact with tempo, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "tempo_url",
                "The URL at which Tempo can be accessed, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "alertmanager_user",
                "The User that is needed to interact with alertmanager, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "alertmanager_url",
                "The URL at which Alertmanager can be accessed, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "graphite_user",
                "The User that is needed to interact with graphite, if set this is returned alongside every issued credential",
            ),
            Attribute::string(
                "graphite_url",
                "The URL at which Graphite can be accessed, if set this is returned alongside every issued credential",
            ),
        ],
    }
}

pub fn role_schema() -> ResourceSchema {
    ResourceSchema {
        type_name: super::ROLE_RESOURCE,
        attributes: vec![
            Attribute::string("backend", "The mount path of the Grafana Cloud backend.")
                .default_value(json!(DEFAULT_BACKEND_PATH))
                .force_new(),
            Attribute::string("name", "The name for the role")
                .required()
                .force_new(),
            Attribute::string("gc_role", "The Grafana Cloud role, i.e. the key authorization level")
                .required(),
            Attribute::int("ttl_seconds", "Default lease for generated credentials in seconds")
                .default_value(json!(DEFAULT_TTL_SECONDS)),
            Attribute::int("max_ttl_seconds", "Maximum time for role in seconds")
                .default_value(json!(DEFAULT_MAX_TTL_SECONDS)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_schema_covers_wire_fields() {
        let schema = backend_schema();
        assert_eq!(schema.attributes.len(), 15);
        for field in crate::provider::backend::CONFIG_FIELDS {
            assert!(schema.attribute(field).is_some(), "{} missing", field);
        }
        assert!(schema.attribute("user").unwrap().deprecated);
        assert_eq!(schema.sensitive_attributes().collect::<Vec<_>>(), vec!["key"]);
    }

    #[test]
    fn test_missing_required() {
        let schema = role_schema();
        let missing = schema.missing_required(|name| name == "name");
        assert_eq!(missing, vec!["gc_role"]);
    }

    #[test]
    fn test_role_defaults() {
        let schema = role_schema();
        assert_eq!(
            schema.attribute("ttl_seconds").unwrap().default,
            Some(json!(300))
        );
        assert!(schema.attribute("name").unwrap().force_new);
    }
}
