//! Remote analysis records.
//!
//! These mirror the payloads returned by the analysis backend. The backend
//! owns the records; the client only reads them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Identifier assigned by the backend when an upload is accepted.
///
/// The backend emits numeric ids, shared links carry them as strings;
/// both deserialize into the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AnalysisId(pub String);

impl AnalysisId {
    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnalysisId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for AnalysisId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for AnalysisId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

/// Analysis processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisStatus {
    /// Accepted but not started
    #[default]
    Pending,
    /// Video bytes are being transferred
    Uploading,
    /// Backend is analysing the video
    Processing,
    /// Reports and clips are available
    Completed,
    /// Backend gave up on the analysis
    Failed,
    /// A status value this client does not know about
    Unknown,
}

impl AnalysisStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Uploading => "uploading",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Unknown => "unknown",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// Check if the backend is still working on the analysis.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Pending | AnalysisStatus::Uploading | AnalysisStatus::Processing
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AnalysisStatus::Pending),
            "uploading" => Ok(AnalysisStatus::Uploading),
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

impl Serialize for AnalysisStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AnalysisStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(AnalysisStatus::Unknown))
    }
}

/// Anything a poll can return: it must expose the remote status.
pub trait HasStatus {
    fn status(&self) -> AnalysisStatus;
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: AnalysisId,
    #[serde(default)]
    pub status: Option<AnalysisStatus>,
}

/// Lightweight status record used while polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: AnalysisStatus,
    /// Only present when status is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl HasStatus for StatusResponse {
    fn status(&self) -> AnalysisStatus {
        self.status
    }
}

/// A downloadable report attached to a completed analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Report {
    fn has_filename(&self, name: &str) -> bool {
        self.filename
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case(name))
    }
}

/// Which side of the match a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Team {
    #[default]
    Home,
    Away,
}

impl Team {
    /// Value expected by the PDF download endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Home => "Home",
            Team::Away => "Away",
        }
    }

    /// Report filenames to look for, most specific first.
    pub fn report_candidates(&self) -> [String; 3] {
        [
            format!("{}_COMPREHENSIVE_REPORT.pdf", self.as_str()),
            format!("{}_report.pdf", self.as_str()),
            "Team_report.pdf".to_string(),
        ]
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Team {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home" | "a" => Ok(Team::Home),
            "away" | "b" => Ok(Team::Away),
            other => Err(ModelError::UnknownTeam(other.to_string())),
        }
    }
}

/// Analysis artefacts produced by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    #[serde(default)]
    pub reports: Vec<Report>,
    /// Detected match events; opaque to the client
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Full analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub id: AnalysisId,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clips_zip_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: AnalysisMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl HasStatus for AnalysisDetails {
    fn status(&self) -> AnalysisStatus {
        self.status
    }
}

impl AnalysisDetails {
    /// Find the PDF report for a team, trying fallback filenames in order.
    pub fn report_for(&self, team: Team) -> Option<&Report> {
        team.report_candidates().iter().find_map(|name| {
            self.metadata
                .reports
                .iter()
                .find(|r| r.has_filename(name) && r.url.is_some())
        })
    }

    /// Filenames of every attached report, for error messages.
    pub fn report_names(&self) -> Vec<&str> {
        self.metadata
            .reports
            .iter()
            .filter_map(|r| r.filename.as_deref())
            .collect()
    }

    /// PDF reports only exist once the analysis has completed.
    pub fn can_download_pdf(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }

    pub fn can_download_zip(&self) -> bool {
        self.clips_zip_url.is_some()
    }
}

/// Row of the analysis listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub id: AnalysisId,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Paginated analysis listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPage {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<AnalysisSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_id_accepts_numbers_and_strings() {
        let numeric: AnalysisId = serde_json::from_str("42").unwrap();
        let text: AnalysisId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(numeric, text);
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "\"42\"");
    }

    #[test]
    fn test_status_terminal_states() {
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
        assert!(!AnalysisStatus::Processing.is_terminal());
        assert!(!AnalysisStatus::Unknown.is_terminal());
        assert!(!AnalysisStatus::Unknown.is_in_flight());
    }

    #[test]
    fn test_unknown_status_does_not_fail_deserialization() {
        let status: StatusResponse = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(status.status, AnalysisStatus::Unknown);
        assert!(status.error_message.is_none());
    }

    #[test]
    fn test_failed_status_carries_message() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"status":"failed","error_message":"bad codec"}"#).unwrap();
        assert_eq!(status.status, AnalysisStatus::Failed);
        assert_eq!(status.error_message.as_deref(), Some("bad codec"));
    }

    fn details_with_reports(reports: &[&str]) -> AnalysisDetails {
        AnalysisDetails {
            id: AnalysisId::from(7),
            status: AnalysisStatus::Completed,
            original_filename: "match.mp4".into(),
            title: None,
            video_url: None,
            clips_zip_url: None,
            error_message: None,
            metadata: AnalysisMetadata {
                reports: reports
                    .iter()
                    .map(|name| Report {
                        filename: Some(name.to_string()),
                        url: Some(format!("https://cdn.example.com/{}", name)),
                    })
                    .collect(),
                events: Vec::new(),
            },
            created_at: None,
        }
    }

    #[test]
    fn test_report_lookup_prefers_comprehensive_report() {
        let details = details_with_reports(&["home_report.pdf", "HOME_COMPREHENSIVE_REPORT.pdf"]);
        let report = details.report_for(Team::Home).unwrap();
        assert_eq!(report.filename.as_deref(), Some("HOME_COMPREHENSIVE_REPORT.pdf"));
    }

    #[test]
    fn test_report_lookup_falls_back() {
        let details = details_with_reports(&["Away_report.pdf", "Team_report.pdf"]);
        assert_eq!(
            details.report_for(Team::Away).unwrap().filename.as_deref(),
            Some("Away_report.pdf")
        );
        assert_eq!(
            details.report_for(Team::Home).unwrap().filename.as_deref(),
            Some("Team_report.pdf")
        );
        assert!(details_with_reports(&["summary.pdf"]).report_for(Team::Home).is_none());
    }

    #[test]
    fn test_details_deserialize_with_sparse_payload() {
        let json = r#"{
            "id": 12,
            "status": "processing",
            "original_filename": "final.mov",
            "metadata": {"reports": [{"filename": "Home_report.pdf", "url": "https://x/y.pdf"}]}
        }"#;
        let details: AnalysisDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.id.as_str(), "12");
        assert_eq!(details.status, AnalysisStatus::Processing);
        assert!(!details.can_download_pdf());
        assert!(!details.can_download_zip());
        assert_eq!(details.report_names(), vec!["Home_report.pdf"]);
    }
}
