use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::interface::Resource;
use crate::provider::schema::{
    backend_schema, provider_schema, role_schema, ResourceSchema, DEFAULT_BACKEND_PATH,
    DEFAULT_MAX_TTL_SECONDS, DEFAULT_TTL_SECONDS,
};
use crate::provider::{
    BackendConfig, BackendState, Provider, ProviderConfig, RoleConfig, RoleState,
};

#[derive(Parser)]
#[command(
    name = "vault-grafanacloud",
    about = "Manage Grafana Cloud secrets engine mounts and roles on Vault",
    version
)]
pub struct Cli {
    /// URL of the root of the target Vault server.
    #[arg(long, global = true, env = "VAULT_ADDR")]
    pub address: Option<String>,

    /// Token to use to authenticate to Vault. Falls back to the token helper.
    #[arg(long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Vault Enterprise namespace to operate in.
    #[arg(long, global = true, env = "VAULT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Print sensitive attributes instead of redacting them.
    #[arg(long, global = true)]
    pub show_sensitive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage Grafana Cloud backend mounts.
    Backend {
        #[command(subcommand)]
        action: BackendAction,
    },
    /// Manage roles under a backend.
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
    /// Print the provider and resource schemas.
    Schema,
}

#[derive(Subcommand)]
pub enum BackendAction {
    /// Mount the plugin and write its configuration.
    Create {
        /// Mount path of the backend.
        #[arg(long, default_value = DEFAULT_BACKEND_PATH)]
        backend: String,
        #[command(flatten)]
        fields: BackendFields,
    },
    /// Show the configuration of a mounted backend.
    Read {
        /// Backend identifier (its mount path).
        #[arg(long)]
        id: String,
    },
    /// Overwrite the given configuration fields.
    Update {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        fields: BackendFields,
    },
    /// Unmount the backend.
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Adopt an existing mount.
    Import {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct BackendFields {
    /// API key with Admin role to create user keys.
    #[arg(long)]
    pub key: Option<String>,
    /// The URL for the Grafana Cloud API.
    #[arg(long)]
    pub url: Option<String>,
    /// The Organisation slug for the Grafana Cloud API.
    #[arg(long)]
    pub organisation: Option<String>,
    /// Deprecated, use --prometheus-user.
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub prometheus_user: Option<String>,
    #[arg(long)]
    pub prometheus_url: Option<String>,
    #[arg(long)]
    pub loki_user: Option<String>,
    #[arg(long)]
    pub loki_url: Option<String>,
    #[arg(long)]
    pub tempo_user: Option<String>,
    #[arg(long)]
    pub tempo_url: Option<String>,
    #[arg(long)]
    pub alertmanager_user: Option<String>,
    #[arg(long)]
    pub alertmanager_url: Option<String>,
    #[arg(long)]
    pub graphite_user: Option<String>,
    #[arg(long)]
    pub graphite_url: Option<String>,
}

impl BackendFields {
    fn into_config(self, backend: String) -> BackendConfig {
        BackendConfig {
            backend,
            key: self.key,
            url: self.url,
            organisation: self.organisation,
            user: self.user,
            prometheus_user: self.prometheus_user,
            prometheus_url: self.prometheus_url,
            loki_user: self.loki_user,
            loki_url: self.loki_url,
            tempo_user: self.tempo_user,
            tempo_url: self.tempo_url,
            alertmanager_user: self.alertmanager_user,
            alertmanager_url: self.alertmanager_url,
            graphite_user: self.graphite_user,
            graphite_url: self.graphite_url,
        }
    }
}

#[derive(Subcommand)]
pub enum RoleAction {
    /// Create a role under a backend.
    Create {
        /// Mount path of the backend.
        #[arg(long, default_value = DEFAULT_BACKEND_PATH)]
        backend: String,
        #[arg(long)]
        name: String,
        /// Grafana Cloud role of issued keys, e.g. Viewer, Editor, Admin.
        #[arg(long)]
        gc_role: String,
        #[arg(long, default_value_t = DEFAULT_TTL_SECONDS)]
        ttl_seconds: u64,
        #[arg(long, default_value_t = DEFAULT_MAX_TTL_SECONDS)]
        max_ttl_seconds: u64,
    },
    /// Show a role.
    Read {
        /// Role identifier, `<backend>/roles/<name>`.
        #[arg(long)]
        id: String,
    },
    /// Rewrite a role with the given fields.
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        gc_role: Option<String>,
        #[arg(long)]
        ttl_seconds: Option<u64>,
        #[arg(long)]
        max_ttl_seconds: Option<u64>,
    },
    /// Delete a role.
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Adopt an existing role.
    Import {
        #[arg(long)]
        id: String,
    },
}

/// Serialises `state` and blanks out the schema's sensitive attributes.
fn render<T: Serialize>(state: &T, schema: &ResourceSchema, show_sensitive: bool) -> Result<String> {
    let mut value = serde_json::to_value(state)?;
    if !show_sensitive {
        if let Some(object) = value.as_object_mut() {
            for name in schema.sensitive_attributes() {
                if let Some(field) = object.get_mut(name) {
                    *field = Value::String("(sensitive value)".to_string());
                }
            }
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn run_backend(provider: &Provider, action: BackendAction, show_sensitive: bool) -> Result<()> {
    let backends = provider.secret_backend();
    let state = match action {
        BackendAction::Create { backend, fields } => {
            let mut state = BackendState::new(fields.into_config(backend));
            backends.create(&mut state).await?;
            info!("Created backend {}", state.id.as_deref().unwrap_or_default());
            state
        }
        BackendAction::Read { id } | BackendAction::Import { id } => {
            let state = backends.import(&id).await?;
            if state.id.is_none() {
                anyhow::bail!("backend {:?} does not exist", id);
            }
            state
        }
        BackendAction::Update { id, fields } => {
            let mut state = BackendState {
                id: Some(id.clone()),
                config: fields.into_config(id),
            };
            backends.update(&mut state).await?;
            backends.read(&mut state).await?;
            state
        }
        BackendAction::Delete { id } => {
            let mut state = BackendState {
                id: Some(id.clone()),
                ..BackendState::default()
            };
            backends
                .delete(&mut state)
                .await
                .with_context(|| format!("deleting backend {:?}", id))?;
            info!("Deleted backend {}", id);
            return Ok(());
        }
    };
    println!("{}", render(&state, &backend_schema(), show_sensitive)?);
    Ok(())
}

async fn run_role(provider: &Provider, action: RoleAction, show_sensitive: bool) -> Result<()> {
    let roles = provider.secret_role();
    let state = match action {
        RoleAction::Create {
            backend,
            name,
            gc_role,
            ttl_seconds,
            max_ttl_seconds,
        } => {
            let config = RoleConfig {
                ttl_seconds: Some(ttl_seconds),
                max_ttl_seconds: Some(max_ttl_seconds),
                ..RoleConfig::new(&backend, &name, &gc_role)
            };
            let mut state = RoleState::new(config);
            roles.create(&mut state).await?;
            info!("Created role {}", state.id.as_deref().unwrap_or_default());
            state
        }
        RoleAction::Read { id } | RoleAction::Import { id } => {
            let state = roles.import(&id).await?;
            if state.id.is_none() {
                anyhow::bail!("role {:?} does not exist", id);
            }
            state
        }
        RoleAction::Update {
            id,
            gc_role,
            ttl_seconds,
            max_ttl_seconds,
        } => {
            let mut state = RoleState {
                id: Some(id),
                // Only the flags given are written.
                config: RoleConfig {
                    backend: String::new(),
                    name: String::new(),
                    gc_role,
                    ttl_seconds,
                    max_ttl_seconds,
                },
            };
            roles.update(&mut state).await?;
            state
        }
        RoleAction::Delete { id } => {
            let mut state = RoleState {
                id: Some(id.clone()),
                ..RoleState::default()
            };
            roles
                .delete(&mut state)
                .await
                .with_context(|| format!("deleting role {:?}", id))?;
            info!("Deleted role {}", id);
            return Ok(());
        }
    };
    println!("{}", render(&state, &role_schema(), show_sensitive)?);
    Ok(())
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        let schemas = vec![provider_schema(), backend_schema(), role_schema()];
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    let config = ProviderConfig {
        address: cli.address,
        token: cli.token,
    };
    let mut provider = Provider::configure(&config)
        .await
        .context("failed to configure provider")?;
    if let Some(namespace) = cli.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        provider = provider.with_namespace(namespace);
    }

    match cli.command {
        Commands::Backend { action } => run_backend(&provider, action, cli.show_sensitive).await,
        Commands::Role { action } => run_role(&provider, action, cli.show_sensitive).await,
        Commands::Schema => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_role_create_defaults() {
        let cli = Cli::try_parse_from([
            "vault-grafanacloud",
            "role",
            "create",
            "--name",
            "viewer-role",
            "--gc-role",
            "Viewer",
        ])
        .unwrap();
        match cli.command {
            Commands::Role {
                action:
                    RoleAction::Create {
                        backend,
                        ttl_seconds,
                        max_ttl_seconds,
                        ..
                    },
            } => {
                assert_eq!(backend, "grafana-cloud");
                assert_eq!(ttl_seconds, 300);
                assert_eq!(max_ttl_seconds, 300);
            }
            _ => panic!("expected role create"),
        }
    }

    #[test]
    fn test_render_redacts_key() {
        let state = BackendState::new(BackendConfig::new("gc", "secret-key", "http://localhost", "org"));
        let hidden = render(&state, &backend_schema(), false).unwrap();
        assert!(!hidden.contains("secret-key"));
        assert!(hidden.contains("(sensitive value)"));

        let shown = render(&state, &backend_schema(), true).unwrap();
        assert!(shown.contains("secret-key"));
    }
}
