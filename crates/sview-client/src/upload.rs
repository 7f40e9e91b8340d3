//! Video payload for the upload endpoint.

use std::path::Path;

use bytes::Bytes;

use crate::error::{ClientError, ClientResult};

/// An opaque video file ready to be sent as a multipart part.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Optional title stored with the analysis
    pub title: Option<String>,
}

impl VideoUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        Self {
            content_type: content_type_for(&file_name).to_string(),
            file_name,
            data: data.into(),
            title: None,
        }
    }

    /// Read a video from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Config(format!("invalid video path: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, data))
    }

    /// Set the analysis title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// MIME type for the video containers the backend accepts.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/avi",
        _ => "application/octet-stream",
    }
}
