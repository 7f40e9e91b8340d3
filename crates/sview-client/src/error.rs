//! Client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Http { status: u16, message: Option<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Message the backend put in the error payload, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend uses `error` for business failures and `detail` for
/// framework-level rejections.
pub(crate) fn extract_server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "detail"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
