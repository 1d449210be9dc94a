//! Vault API layer
//!
//! Thin typed access to the parts of the Vault HTTP API the resources need:
//! the logical API (`read`/`write`/`delete` of flat field maps), the sys
//! mount table, and token lookup through the CLI's token helper.
//!
//! ## Testing strategy:
//! - Each module contains its own unit tests within a `#[cfg(test)] mod tests` block
//! - HTTP behaviour is tested against a `wiremock` server standing in for Vault
//! - Lifecycle tests in the `tests/` directory exercise the resources end to end

pub mod client;
pub mod common;
pub mod error;
pub mod token;

// Re-export key types for convenience
pub use client::{ClientConfig, VaultClient};
pub use common::{MountInput, MountOutput, Secret};
pub use error::VaultError;
pub use token::{resolve_token, TokenError, TokenHelper};
