//! Remote store error types.

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Store returned {status}: {body}")]
    StatusError { status: u16, body: String },

    #[error("Store rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid store payload: {0}")]
    InvalidPayload(String),

    #[error("Poll timed out after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Whether a retry can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Http(e) => e.is_timeout() || e.is_connect(),
            RemoteError::StatusError { status, .. } => *status >= 500,
            RemoteError::RateLimited { .. } => true,
            RemoteError::RequestFailed(_) => true,
            _ => false,
        }
    }
}
