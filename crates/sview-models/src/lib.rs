//! Shared data models for the SkillsView analysis client.
//!
//! This crate provides Serde-serializable types for:
//! - Remote analysis records (upload, status, details, reports)
//! - The client-side `AnalysisJob` lifecycle
//! - Subscription quota and user profile
//! - The processing-time estimate shown while an analysis runs

pub mod analysis;
pub mod error;
pub mod estimate;
pub mod job;
pub mod quota;

// Re-export common types
pub use analysis::{
    AnalysisDetails, AnalysisId, AnalysisMetadata, AnalysisPage, AnalysisStatus, AnalysisSummary,
    HasStatus, Report, StatusResponse, Team, UploadResponse,
};
pub use error::ModelError;
pub use estimate::EstimatedTime;
pub use job::AnalysisJob;
pub use quota::{Quota, Subscription, UserProfile};
