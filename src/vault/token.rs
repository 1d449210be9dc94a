//! Token helper lookup.
//!
//! When no token is configured explicitly, the token is taken from the same
//! place the `vault` CLI keeps it: the per-user `~/.vault-token` file, or an
//! external helper program named by `token_helper` in the CLI config file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

pub const ENV_CONFIG_PATH: &str = "VAULT_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = ".vault";
const DEFAULT_TOKEN_FILE: &str = ".vault-token";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The helper could not be located: bad config file or helper path.
    #[error("error getting token helper: {0}")]
    Helper(String),

    /// The helper was found but invoking it failed.
    #[error("error getting token: {0}")]
    Read(String),
}

/// Where a token comes from when none is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenHelper {
    /// Plain file holding the token, normally `~/.vault-token`.
    Internal { path: PathBuf },
    /// Program invoked as `<program> get`, printing the token on stdout.
    External { program: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    token_helper: Option<String>,
}

impl TokenHelper {
    /// The helper the `vault` CLI would use: from the file named by
    /// `VAULT_CONFIG_PATH`, else `~/.vault`.
    pub async fn from_default_config() -> Result<Self, TokenError> {
        let home = dirs::home_dir()
            .ok_or_else(|| TokenError::Helper("unable to determine home directory".into()))?;
        let config_path = std::env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(DEFAULT_CONFIG_FILE));
        Self::from_config_file(&config_path, &home).await
    }

    /// Loads the helper from a CLI config file. A missing file means the
    /// internal helper under `home`.
    pub async fn from_config_file(config_path: &Path, home: &Path) -> Result<Self, TokenError> {
        let contents = match tokio::fs::read_to_string(config_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(TokenError::Helper(format!(
                    "error reading config file {}: {}",
                    config_path.display(),
                    e
                )))
            }
        };
        let config = parse_cli_config(&contents).map_err(|e| {
            TokenError::Helper(format!(
                "error parsing config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        match config.token_helper.filter(|h| !h.trim().is_empty()) {
            Some(program) => Ok(TokenHelper::External {
                program: locate_helper(program.trim()).await?,
            }),
            None => Ok(TokenHelper::Internal {
                path: home.join(DEFAULT_TOKEN_FILE),
            }),
        }
    }

    /// Fetches the stored token. An absent token file yields an empty string.
    pub async fn get(&self) -> Result<String, TokenError> {
        match self {
            TokenHelper::Internal { path } => {
                debug!("Reading token from {}", path.display());
                match tokio::fs::read_to_string(path).await {
                    Ok(token) => Ok(token),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                    Err(e) => Err(TokenError::Read(format!(
                        "error reading {}: {}",
                        path.display(),
                        e
                    ))),
                }
            }
            TokenHelper::External { program } => {
                debug!("Invoking token helper {}", program.display());
                let output = Command::new(program).arg("get").output().await.map_err(|e| {
                    TokenError::Read(format!("error running {}: {}", program.display(), e))
                })?;
                if !output.status.success() {
                    return Err(TokenError::Read(format!(
                        "{} exited with {}: {}",
                        program.display(),
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
        }
    }
}

/// Makes a helper path absolute against the working directory and checks
/// that it exists.
async fn locate_helper(program: &str) -> Result<PathBuf, TokenError> {
    let mut path = PathBuf::from(program);
    if !path.is_absolute() {
        let cwd = std::env::current_dir().map_err(|e| {
            TokenError::Helper(format!("unable to resolve {}: {}", program, e))
        })?;
        path = cwd.join(path);
    }
    tokio::fs::metadata(&path).await.map_err(|e| {
        TokenError::Helper(format!("unable to find token helper {}: {}", path.display(), e))
    })?;
    Ok(path)
}

/// Returns the token to authenticate with: `explicit` when non-empty,
/// otherwise whatever the default token helper holds, trimmed.
pub async fn resolve_token(explicit: Option<&str>) -> Result<String, TokenError> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    let helper = TokenHelper::from_default_config().await?;
    Ok(helper.get().await?.trim().to_string())
}

/// Accepts the JSON form of the CLI config, or HCL from which only a
/// single-line top-level `token_helper = "..."` assignment is picked out.
/// Other HCL forms, such as a heredoc value or a `token_helper` nested in a
/// block, are not recognised.
fn parse_cli_config(contents: &str) -> Result<CliConfig, String> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(CliConfig::default());
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| e.to_string());
    }

    let mut config = CliConfig::default();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        // Other settings may use HCL forms this parser does not handle.
        if !line.starts_with("token_helper") {
            continue;
        }
        let (_, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected token_helper = \"...\"", number + 1))?;
        let value = value
            .trim()
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .ok_or_else(|| format!("line {}: value must be a quoted string", number + 1))?;
        config.token_helper = Some(value.to_string());
    }
    Ok(config)
}
