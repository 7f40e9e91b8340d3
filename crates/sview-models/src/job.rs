//! Client-side lifecycle of one submitted video.
//!
//! An `AnalysisJob` exists from file selection until the status modal is
//! dismissed. Its `progress` is simulated locally: the backend does not
//! report a percentage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalysisId, AnalysisStatus, EstimatedTime};

/// Progress shown as soon as the upload starts.
pub const UPLOAD_START_PROGRESS: u8 = 10;
/// Progress shown once the backend accepted the upload.
pub const PROCESSING_START_PROGRESS: u8 = 30;
/// Increment applied on every non-terminal poll.
pub const PROGRESS_STEP: u8 = 5;
/// Simulated progress never goes past this before completion.
pub const PROGRESS_CEILING: u8 = 90;

pub const UPLOADING_MESSAGE: &str = "Uploading video...";
pub const PROCESSING_MESSAGE: &str = "Smart analysis in progress...";
pub const COMPLETED_MESSAGE: &str = "Analysis completed successfully!";
pub const UPLOAD_FAILED_MESSAGE: &str = "Error while uploading the video.";
pub const PROCESSING_FAILED_MESSAGE: &str = "The analysis failed.";

/// One video submission as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Assigned by the backend once the upload is accepted
    pub id: Option<AnalysisId>,
    pub status: AnalysisStatus,
    /// Advisory progress (0-100)
    pub progress: u8,
    pub message: String,
    /// Size of the original file
    pub size_bytes: u64,
    /// Only set when status is `failed`
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisJob {
    /// Start a job for a file that is about to be uploaded.
    pub fn uploading(size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            status: AnalysisStatus::Uploading,
            progress: UPLOAD_START_PROGRESS,
            message: UPLOADING_MESSAGE.to_string(),
            size_bytes,
            error_message: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record the backend identifier and move to `processing`.
    ///
    /// Returns `false` when the job is not uploading.
    pub fn mark_processing(&mut self, id: AnalysisId) -> bool {
        if self.status != AnalysisStatus::Uploading {
            return false;
        }
        self.id = Some(id);
        self.status = AnalysisStatus::Processing;
        self.progress = self.progress.max(PROCESSING_START_PROGRESS);
        self.message = PROCESSING_MESSAGE.to_string();
        self.touch();
        true
    }

    /// Nudge the simulated progress after a non-terminal poll.
    pub fn advance_progress(&mut self) {
        if self.status != AnalysisStatus::Processing {
            return;
        }
        self.progress = self
            .progress
            .saturating_add(PROGRESS_STEP)
            .min(PROGRESS_CEILING)
            .max(self.progress);
        self.touch();
    }

    /// Mark job as completed.
    pub fn complete(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = AnalysisStatus::Completed;
        self.progress = 100;
        self.message = COMPLETED_MESSAGE.to_string();
        self.touch();
        true
    }

    /// Mark job as failed, preferring the server message over `fallback`.
    pub fn fail(&mut self, server_message: Option<String>, fallback: &str) -> bool {
        if self.is_terminal() {
            return false;
        }
        let message = server_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        self.status = AnalysisStatus::Failed;
        self.message = message.clone();
        self.error_message = Some(message);
        self.touch();
        true
    }

    /// Processing-time estimate for the file.
    pub fn estimated_time(&self) -> Option<EstimatedTime> {
        EstimatedTime::from_size_bytes(self.size_bytes)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_to_completion() {
        let mut job = AnalysisJob::uploading(1024);
        assert_eq!(job.status, AnalysisStatus::Uploading);
        assert_eq!(job.progress, UPLOAD_START_PROGRESS);

        assert!(job.mark_processing(AnalysisId::from(3)));
        assert_eq!(job.status, AnalysisStatus::Processing);
        assert_eq!(job.progress, PROCESSING_START_PROGRESS);
        assert_eq!(job.id, Some(AnalysisId::from(3)));

        assert!(job.complete());
        assert_eq!(job.progress, 100);
        assert!(job.is_terminal());
        assert_eq!(job.message, COMPLETED_MESSAGE);
    }

    #[test]
    fn test_progress_is_capped_below_completion() {
        let mut job = AnalysisJob::uploading(1024);
        job.mark_processing(AnalysisId::from(1));

        let mut last = job.progress;
        for _ in 0..50 {
            job.advance_progress();
            assert!(job.progress >= last);
            last = job.progress;
        }
        assert_eq!(job.progress, PROGRESS_CEILING);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut job = AnalysisJob::uploading(1024);
        assert!(job.fail(None, UPLOAD_FAILED_MESSAGE));
        assert_eq!(job.message, UPLOAD_FAILED_MESSAGE);

        assert!(!job.complete());
        assert!(!job.mark_processing(AnalysisId::from(9)));
        assert_eq!(job.status, AnalysisStatus::Failed);
    }

    #[test]
    fn test_fail_prefers_server_message() {
        let mut job = AnalysisJob::uploading(1024);
        job.mark_processing(AnalysisId::from(1));
        job.fail(Some("Unsupported codec".into()), PROCESSING_FAILED_MESSAGE);
        assert_eq!(job.message, "Unsupported codec");
        assert_eq!(job.error_message.as_deref(), Some("Unsupported codec"));

        let mut blank = AnalysisJob::uploading(1024);
        blank.fail(Some("  ".into()), PROCESSING_FAILED_MESSAGE);
        assert_eq!(blank.message, PROCESSING_FAILED_MESSAGE);
    }

    #[test]
    fn test_advance_ignored_outside_processing() {
        let mut job = AnalysisJob::uploading(1024);
        job.advance_progress();
        assert_eq!(job.progress, UPLOAD_START_PROGRESS);
    }
}
