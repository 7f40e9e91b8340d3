//! Processing-time estimate derived from the uploaded file size.
//!
//! Display only. Nothing in the upload flow may branch on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference input size (MiB) for the linear estimate.
pub const REFERENCE_SIZE_MB: f64 = 200.0;
/// Expected processing minutes for `REFERENCE_SIZE_MB` of input.
pub const REFERENCE_MINUTES: f64 = 120.0;
/// Estimates at or above this many minutes collapse into a single label.
pub const ESTIMATE_CAP_MINUTES: u64 = 600;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimated processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatedTime {
    /// Under an hour
    Minutes { minutes: u64 },
    /// One to ten hours
    Hours { hours: u64, minutes: u64 },
    /// Ten hours or more
    OverTenHours,
}

impl EstimatedTime {
    /// Estimate from a file size. Returns `None` for an empty or unknown size.
    pub fn from_size_bytes(size_bytes: u64) -> Option<Self> {
        if size_bytes == 0 {
            return None;
        }
        Some(Self::from_minutes(estimated_minutes(size_bytes)))
    }

    /// Bucket a minute count into its display form.
    pub fn from_minutes(minutes: u64) -> Self {
        if minutes >= ESTIMATE_CAP_MINUTES {
            EstimatedTime::OverTenHours
        } else if minutes < 60 {
            EstimatedTime::Minutes { minutes }
        } else {
            EstimatedTime::Hours {
                hours: minutes / 60,
                minutes: minutes % 60,
            }
        }
    }
}

/// Linear estimate in whole minutes, rounded half away from zero.
pub fn estimated_minutes(size_bytes: u64) -> u64 {
    let size_mb = size_bytes as f64 / BYTES_PER_MB;
    ((size_mb / REFERENCE_SIZE_MB) * REFERENCE_MINUTES).round() as u64
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatedTime::Minutes { minutes } => write!(f, "~{} min", minutes),
            EstimatedTime::Hours { hours, minutes: 0 } => write!(f, "~{}h", hours),
            EstimatedTime::Hours { hours, minutes } => write!(f, "~{}h {}min", hours, minutes),
            EstimatedTime::OverTenHours => write!(f, "+10h"),
        }
    }
}
