//! Quota held by the signed-in session.
//!
//! The upload controller reads the quota before submitting and asks for a
//! refresh once an analysis completes. It never writes the quota itself.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use sview_client::AnalysisApi;
use sview_models::Quota;
use tracing::{debug, warn};

/// Session collaborator that owns the quota.
#[async_trait]
pub trait QuotaSession: Send + Sync {
    /// Last known quota.
    fn quota(&self) -> Quota;

    /// Reload the quota from the backend. Failures are logged, not returned.
    async fn refresh(&self);
}

/// Quota session backed by the profile endpoint.
pub struct ApiSession {
    api: Arc<dyn AnalysisApi>,
    quota: RwLock<Quota>,
}

impl ApiSession {
    pub fn new(api: Arc<dyn AnalysisApi>, quota: Quota) -> Self {
        Self {
            api,
            quota: RwLock::new(quota),
        }
    }

    /// Fetch the initial quota. A failed lookup leaves the gate open,
    /// since the backend rejects over-quota uploads anyway.
    pub async fn load(api: Arc<dyn AnalysisApi>) -> Self {
        let session = Self::new(api, Quota::unlimited());
        session.refresh().await;
        session
    }
}

#[async_trait]
impl QuotaSession for ApiSession {
    fn quota(&self) -> Quota {
        *self.quota.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self) {
        match self.api.refresh_quota().await {
            Ok(quota) => {
                debug!(
                    quota_remaining = quota.quota_remaining,
                    plan_quota = quota.plan_quota,
                    "Quota refreshed"
                );
                *self.quota.write().unwrap_or_else(PoisonError::into_inner) = quota;
            }
            Err(e) => warn!("Failed to refresh quota: {}", e),
        }
    }
}
