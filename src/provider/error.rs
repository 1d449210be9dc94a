use crate::provider::path::PathError;
use crate::vault::{TokenError, VaultError};

/// Failure of a provider or resource operation.
///
/// Remote failures keep the path involved and the underlying [`VaultError`],
/// so callers can still ask whether Vault reported the path as missing.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no vault token found")]
    NoToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("failed to configure Vault API: {0}")]
    ClientInit(#[source] VaultError),

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("{0} has no identifier; create or import it first")]
    MissingIdentifier(&'static str),

    #[error("error mounting to {path:?}: {source}")]
    Mount { path: String, source: VaultError },

    #[error("error writing {path:?}: {source}")]
    ConfigWrite { path: String, source: VaultError },

    #[error("error reading {path:?}: {source}")]
    ConfigRead { path: String, source: VaultError },

    #[error("error unmounting vault grafana cloud backend from {path:?}: {source}")]
    Unmount { path: String, source: VaultError },

    #[error("error writing role {path:?}: {source}")]
    RoleWrite { path: String, source: VaultError },

    #[error("error reading role {path:?}: {source}")]
    RoleRead { path: String, source: VaultError },

    #[error("error deleting {path:?}: {source}")]
    RoleDelete { path: String, source: VaultError },

    #[error("invalid role ID {id:?}: {source}")]
    InvalidIdentifier { id: String, source: PathError },

    #[error("error setting state key '{field}': {reason}")]
    StateField { field: &'static str, reason: String },
}

impl ProviderError {
    /// The Vault error behind a remote operation failure, if any.
    pub fn vault_error(&self) -> Option<&VaultError> {
        match self {
            ProviderError::ClientInit(source)
            | ProviderError::Mount { source, .. }
            | ProviderError::ConfigWrite { source, .. }
            | ProviderError::ConfigRead { source, .. }
            | ProviderError::Unmount { source, .. }
            | ProviderError::RoleWrite { source, .. }
            | ProviderError::RoleRead { source, .. }
            | ProviderError::RoleDelete { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the failure was Vault reporting the target as absent.
    pub fn is_not_found(&self) -> bool {
        self.vault_error().is_some_and(VaultError::is_not_found)
    }
}
