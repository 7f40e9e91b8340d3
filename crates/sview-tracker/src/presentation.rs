//! Status modal contract.
//!
//! Maps a job snapshot to what the status modal shows. Rendering `None`
//! means no modal at all.

use std::fmt;

use sview_models::{AnalysisJob, AnalysisStatus, EstimatedTime};

pub const DEFAULT_HINT: &str = "Please wait while we process your video.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGlyph {
    Spinner,
    Success,
    Failure,
}

impl StatusGlyph {
    fn symbol(self) -> &'static str {
        match self {
            StatusGlyph::Spinner => "...",
            StatusGlyph::Success => "[ok]",
            StatusGlyph::Failure => "[x]",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub status: AnalysisStatus,
    pub glyph: StatusGlyph,
    pub title: &'static str,
    pub message: String,
    /// Only while uploading or processing
    pub progress: Option<u8>,
    /// Only while processing
    pub estimated_time: Option<EstimatedTime>,
    /// Only in terminal states
    pub dismissible: bool,
}

impl StatusView {
    pub fn render(job: Option<&AnalysisJob>) -> Option<Self> {
        let job = job?;

        let (glyph, title) = match job.status {
            AnalysisStatus::Completed => (StatusGlyph::Success, "Analysis complete"),
            AnalysisStatus::Failed => (StatusGlyph::Failure, "Analysis failed"),
            AnalysisStatus::Uploading => (StatusGlyph::Spinner, "Uploading"),
            _ => (StatusGlyph::Spinner, "Processing"),
        };
        let running = matches!(job.status, AnalysisStatus::Uploading | AnalysisStatus::Processing);
        let message = if job.message.trim().is_empty() {
            DEFAULT_HINT.to_string()
        } else {
            job.message.clone()
        };

        Some(Self {
            status: job.status,
            glyph,
            title,
            message,
            progress: running.then_some(job.progress),
            estimated_time: if job.status == AnalysisStatus::Processing {
                job.estimated_time()
            } else {
                None
            },
            dismissible: job.is_terminal(),
        })
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.glyph.symbol(), self.title, self.message)?;
        if let Some(progress) = self.progress {
            write!(f, " [{:>3}%]", progress)?;
        }
        if let Some(estimate) = &self.estimated_time {
            write!(f, " (estimated {})", estimate)?;
        }
        Ok(())
    }
}
