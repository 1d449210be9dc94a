use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("invalid Vault address {0:?}: {1}")]
    InvalidAddress(String, String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-success response. The message joins the `errors` array Vault
    /// returned, or holds the raw body when there was none.
    #[error("Error making API request.\n\nURL: {method} {url}\nCode: {status}. Errors:\n\n{message}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Error from reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Status code of a failed API request, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            VaultError::HttpStatus { status, .. } => Some(*status),
            VaultError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether Vault reported the target path as missing.
    ///
    /// Recognised by the `Code: 404` marker in the rendered error, which is
    /// how callers further up the stack tell "already gone" from a failure.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
            || self.to_string().contains("Code: 404")
    }

    /// Whether the request may succeed if sent again.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            VaultError::Connection(_) => true,
            VaultError::HttpStatus { status, .. } => {
                (*status >= 500 && *status != StatusCode::NOT_IMPLEMENTED.as_u16())
                    || *status == StatusCode::PRECONDITION_FAILED.as_u16()
            }
            _ => false,
        }
    }
}
