//! Seam between the upload/poll core and the remote backend.

use std::sync::Arc;

use async_trait::async_trait;
use sview_models::{AnalysisDetails, AnalysisId, Quota, StatusResponse, UploadResponse};

use crate::error::ClientResult;
use crate::upload::VideoUpload;

/// Operations the upload controller and results viewer need.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Upload a video; the backend answers with the new analysis id.
    async fn submit(&self, upload: &VideoUpload) -> ClientResult<UploadResponse>;

    /// Lightweight status lookup used while polling.
    async fn get_status(&self, id: &AnalysisId) -> ClientResult<StatusResponse>;

    /// Full analysis record.
    async fn get_details(&self, id: &AnalysisId) -> ClientResult<AnalysisDetails>;

    /// Current subscription quota for the signed-in user.
    async fn refresh_quota(&self) -> ClientResult<Quota>;
}

#[async_trait]
impl<T: AnalysisApi + ?Sized> AnalysisApi for Arc<T> {
    async fn submit(&self, upload: &VideoUpload) -> ClientResult<UploadResponse> {
        (**self).submit(upload).await
    }

    async fn get_status(&self, id: &AnalysisId) -> ClientResult<StatusResponse> {
        (**self).get_status(id).await
    }

    async fn get_details(&self, id: &AnalysisId) -> ClientResult<AnalysisDetails> {
        (**self).get_details(id).await
    }

    async fn refresh_quota(&self) -> ClientResult<Quota> {
        (**self).refresh_quota().await
    }
}
