//! Client configuration.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Configuration for the analysis client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API
    pub base_url: String,
    /// Timeout for regular requests
    pub timeout: Duration,
    /// Timeout for video uploads (overrides `timeout`)
    pub upload_timeout: Duration,
    /// Bearer token sent with every request
    pub access_token: Option<String>,
    /// Token used to obtain a new access token on 401
    pub refresh_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(1800), // 30 minutes for large matches
            access_token: None,
            refresh_token: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SVIEW_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("SVIEW_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            upload_timeout: Duration::from_secs(
                std::env::var("SVIEW_UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            access_token: std::env::var("SVIEW_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()),
            refresh_token: std::env::var("SVIEW_REFRESH_TOKEN").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set both tokens.
    pub fn with_tokens(mut self, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        self.access_token = Some(access.into());
        self.refresh_token = Some(refresh.into());
        self
    }

    /// Join a relative endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("upload_timeout", &self.upload_timeout)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
