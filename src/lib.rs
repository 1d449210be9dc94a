//! vault-grafanacloud - Grafana Cloud secrets engine provisioning for Vault
//!
//! This crate manages two kinds of objects on a HashiCorp Vault server:
//! mounts of the Grafana Cloud secrets plugin together with their
//! configuration, and the roles under those mounts that govern which
//! Grafana Cloud keys get issued and for how long.
//!
//! ## Architecture
//!
//! - `vault` module - HTTP client, wire types and token helper lookup
//! - `provider` module - client bootstrap and the backend/role resources
//! - `interface` module - the lifecycle trait the resources implement
//! - `cli` module - command-line front end over the resources
//!
//! Resources never talk HTTP themselves; they go through the client handed
//! out by [`provider::Provider`], which owns authentication and retries.

pub mod cli;
pub mod interface;
pub mod provider;
pub mod vault;

// Re-export public types for convenience
pub use interface::{Resource, ResourceState};
pub use provider::{Provider, ProviderConfig, ProviderError};

/// Initialize logging for the application.
///
/// Honours `RUST_LOG` and defaults to `info`. Output goes to stderr so that
/// stdout carries only command results.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize logging for unit tests
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
