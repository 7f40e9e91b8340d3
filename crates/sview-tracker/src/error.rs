//! Tracker error types.

use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Local quota gate refused the submission; nothing was sent.
    #[error("Quota exhausted ({remaining} of {plan_quota} left). Upgrade your subscription to analyse more videos.")]
    QuotaExceeded { remaining: i64, plan_quota: i64 },

    #[error("Controller has been shut down")]
    Inactive,
}
