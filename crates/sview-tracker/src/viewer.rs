//! Results page tracking.
//!
//! Used when an analysis is opened directly by id instead of through the
//! upload flow. If the analysis is still running, the viewer keeps the
//! details fresh with the same [`Poller`] the upload controller uses.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sview_client::AnalysisApi;
use sview_models::{AnalysisDetails, AnalysisId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::poller::{PollControl, Poller};

pub const LOAD_FAILED_MESSAGE: &str = "Unable to load the analysis.";

/// What the results page shows.
#[derive(Debug, Clone, Default)]
pub enum ViewerState {
    #[default]
    Idle,
    Loading,
    Loaded(AnalysisDetails),
    Failed(String),
    /// No analysis id was given
    Empty,
}

impl ViewerState {
    pub fn details(&self) -> Option<&AnalysisDetails> {
        match self {
            ViewerState::Loaded(details) => Some(details),
            _ => None,
        }
    }
}

struct ViewerShared {
    view: ViewerState,
    generation: u64,
    poller: Poller,
    shut_down: bool,
}

impl ViewerShared {
    fn is_current(&self, generation: u64) -> bool {
        !self.shut_down && self.generation == generation
    }
}

struct Inner {
    api: Arc<dyn AnalysisApi>,
    state: Mutex<ViewerShared>,
    snapshots: watch::Sender<ViewerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ViewerShared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_view(&self, state: &mut ViewerShared, view: ViewerState) {
        state.view = view;
        self.snapshots.send_replace(state.view.clone());
    }
}

pub struct ResultsViewer {
    inner: Arc<Inner>,
}

impl ResultsViewer {
    pub fn new(api: Arc<dyn AnalysisApi>, config: &TrackerConfig) -> Self {
        let (snapshots, _) = watch::channel(ViewerState::Idle);
        Self {
            inner: Arc::new(Inner {
                api,
                state: Mutex::new(ViewerShared {
                    view: ViewerState::Idle,
                    generation: 0,
                    poller: Poller::from_config(config),
                    shut_down: false,
                }),
                snapshots,
            }),
        }
    }

    pub fn state(&self) -> ViewerState {
        self.inner.lock().view.clone()
    }

    /// Details of the loaded analysis, if any.
    pub fn details(&self) -> Option<AnalysisDetails> {
        self.inner.lock().view.details().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewerState> {
        self.inner.snapshots.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock().poller.is_active()
    }

    /// Load an analysis and keep polling it while it is pending, uploading
    /// or processing.
    ///
    /// Returns the state right after the initial fetch. Loading a new id
    /// stops tracking the previous one.
    pub async fn load_and_track(&self, id: Option<AnalysisId>) -> TrackerResult<ViewerState> {
        let (id, generation) = {
            let mut state = self.inner.lock();
            if state.shut_down {
                return Err(TrackerError::Inactive);
            }
            state.poller.cancel();
            state.generation += 1;

            let Some(id) = id else {
                self.inner.set_view(&mut state, ViewerState::Empty);
                return Ok(ViewerState::Empty);
            };
            self.inner.set_view(&mut state, ViewerState::Loading);
            (id, state.generation)
        };

        let result = self.inner.api.get_details(&id).await;

        let mut state = self.inner.lock();
        if !state.is_current(generation) {
            debug!(analysis_id = %id, "Discarding details for an abandoned view");
            return Ok(state.view.clone());
        }

        match result {
            Ok(details) => {
                let status = details.status;
                self.inner.set_view(&mut state, ViewerState::Loaded(details));
                if status.is_in_flight() {
                    info!(analysis_id = %id, status = %status, "Analysis still running, tracking");
                    start_polling(&self.inner, &mut state, id, generation);
                } else {
                    info!(analysis_id = %id, status = %status, "Analysis loaded");
                }
            }
            Err(e) => {
                warn!(analysis_id = %id, "Failed to load analysis: {}", e);
                let failed = ViewerState::Failed(LOAD_FAILED_MESSAGE.to_string());
                self.inner.set_view(&mut state, failed);
            }
        }

        Ok(state.view.clone())
    }

    /// Stop tracking. Results of requests in flight are ignored.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.shut_down = true;
        state.poller.cancel();
    }
}

impl Drop for ResultsViewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn start_polling(inner: &Arc<Inner>, state: &mut ViewerShared, id: AnalysisId, generation: u64) {
    let api = Arc::clone(&inner.api);
    let poll_id = id.clone();
    let weak: Weak<Inner> = Arc::downgrade(inner);

    state.poller.start(
        format!("results:{}", id),
        move || {
            let api = Arc::clone(&api);
            let id = poll_id.clone();
            async move { api.get_details(&id).await }
        },
        move |details: AnalysisDetails| {
            let Some(inner) = weak.upgrade() else {
                return PollControl::Stop;
            };
            let mut state = inner.lock();
            if !state.is_current(generation) {
                return PollControl::Stop;
            }
            let in_flight = details.status.is_in_flight();
            if !in_flight {
                info!(analysis_id = %details.id, status = %details.status, "Analysis finished");
            }
            inner.set_view(&mut state, ViewerState::Loaded(details));
            if in_flight {
                PollControl::Continue
            } else {
                PollControl::Stop
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use sview_client::{ClientError, ClientResult, VideoUpload};
    use sview_models::{AnalysisMetadata, AnalysisStatus, Quota, StatusResponse, UploadResponse};

    const PERIOD: Duration = Duration::from_secs(5);

    fn record(status: AnalysisStatus) -> AnalysisDetails {
        AnalysisDetails {
            id: AnalysisId::from(21),
            status,
            original_filename: "final.mp4".into(),
            title: None,
            video_url: None,
            clips_zip_url: None,
            error_message: None,
            metadata: AnalysisMetadata::default(),
            created_at: None,
        }
    }

    struct DetailsApi {
        script: Mutex<VecDeque<ClientResult<AnalysisDetails>>>,
        calls: AtomicU32,
    }

    impl DetailsApi {
        fn scripted(script: Vec<ClientResult<AnalysisDetails>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalysisApi for DetailsApi {
        async fn submit(&self, _upload: &VideoUpload) -> ClientResult<UploadResponse> {
            unimplemented!()
        }

        async fn get_status(&self, _id: &AnalysisId) -> ClientResult<StatusResponse> {
            unimplemented!()
        }

        async fn get_details(&self, _id: &AnalysisId) -> ClientResult<AnalysisDetails> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(record(AnalysisStatus::Processing)))
        }

        async fn refresh_quota(&self) -> ClientResult<Quota> {
            unimplemented!()
        }
    }

    fn viewer(api: &Arc<DetailsApi>) -> ResultsViewer {
        ResultsViewer::new(api.clone(), &TrackerConfig::default())
    }

    async fn advance(by: Duration) {
        tokio::time::advance(by).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_id_is_empty() {
        let api = DetailsApi::scripted(vec![]);
        let viewer = viewer(&api);

        let state = viewer.load_and_track(None).await.unwrap();
        assert!(matches!(state, ViewerState::Empty));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_reports_generic_message() {
        let api = DetailsApi::scripted(vec![Err(ClientError::Http {
            status: 404,
            message: Some("Not found.".into()),
        })]);
        let viewer = viewer(&api);

        let state = viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        match state {
            ViewerState::Failed(message) => assert_eq!(message, LOAD_FAILED_MESSAGE),
            other => panic!("unexpected state: {:?}", other),
        }
        assert!(!viewer.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_analysis_is_not_polled() {
        let api = DetailsApi::scripted(vec![Ok(record(AnalysisStatus::Completed))]);
        let viewer = viewer(&api);

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        assert!(!viewer.is_polling());

        advance(PERIOD * 3).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_analysis_is_tracked_until_terminal() {
        let api = DetailsApi::scripted(vec![
            Ok(record(AnalysisStatus::Pending)),
            Err(ClientError::InvalidResponse("truncated body".into())),
            Ok(record(AnalysisStatus::Processing)),
            Ok(record(AnalysisStatus::Completed)),
        ]);
        let viewer = viewer(&api);
        let snapshots = viewer.subscribe();

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        assert!(viewer.is_polling());
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Pending);

        advance(PERIOD).await;
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Pending);
        assert!(viewer.is_polling());

        advance(PERIOD).await;
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Processing);

        advance(PERIOD).await;
        assert!(!viewer.is_polling());
        assert_eq!(
            snapshots.borrow().details().map(|d| d.status),
            Some(AnalysisStatus::Completed)
        );

        advance(PERIOD * 2).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognised_status_is_not_polled() {
        let api = DetailsApi::scripted(vec![Ok(record(AnalysisStatus::Unknown))]);
        let viewer = viewer(&api);

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        assert!(!viewer.is_polling());

        advance(PERIOD * 4).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_status_leaves_known_running_states() {
        let api = DetailsApi::scripted(vec![
            Ok(record(AnalysisStatus::Processing)),
            Ok(record(AnalysisStatus::Unknown)),
        ]);
        let viewer = viewer(&api);

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        assert!(viewer.is_polling());

        advance(PERIOD).await;
        assert!(!viewer.is_polling());
        assert_eq!(viewer.details().unwrap().status, AnalysisStatus::Unknown);

        advance(PERIOD * 3).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_tracking() {
        let api = DetailsApi::scripted(vec![Ok(record(AnalysisStatus::Uploading))]);
        let viewer = viewer(&api);

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        viewer.shutdown();
        advance(PERIOD * 3).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            viewer.load_and_track(Some(AnalysisId::from(21))).await,
            Err(TrackerError::Inactive)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_replaces_previous_poll() {
        let api = DetailsApi::scripted(vec![
            Ok(record(AnalysisStatus::Processing)),
            Ok(record(AnalysisStatus::Processing)),
        ]);
        let viewer = viewer(&api);

        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        viewer.load_and_track(Some(AnalysisId::from(21))).await.unwrap();
        advance(PERIOD).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }
}
