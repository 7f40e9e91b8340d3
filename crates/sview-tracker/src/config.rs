//! Tracker configuration.

use std::time::Duration;

/// Polling and navigation timings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between two status polls
    pub poll_interval: Duration,
    /// Delay between completion and the navigation to the results view
    pub redirect_delay: Duration,
    /// Consecutive poll failures logged before further warnings are suppressed
    pub max_logged_poll_failures: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            redirect_delay: Duration::from_millis(1500),
            max_logged_poll_failures: 5,
        }
    }
}

impl TrackerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("SVIEW_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(5),
            ),
            redirect_delay: Duration::from_millis(
                std::env::var("SVIEW_REDIRECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1500),
            ),
            max_logged_poll_failures: std::env::var("SVIEW_MAX_LOGGED_POLL_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.redirect_delay, Duration::from_millis(1500));
    }
}
