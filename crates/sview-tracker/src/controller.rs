//! Upload/poll controller.
//!
//! Drives one `AnalysisJob` through
//! `idle -> uploading -> processing -> completed | failed` and back to idle
//! on dismissal. The job is owned here; collaborators only see snapshots
//! through [`UploadController::subscribe`].
//!
//! Every asynchronous step is tagged with the generation that started it.
//! A dismissal, a new upload or a shutdown bumps the generation, and late
//! results from older generations are dropped instead of applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sview_client::{AnalysisApi, VideoUpload};
use sview_models::job::{PROCESSING_FAILED_MESSAGE, UPLOAD_FAILED_MESSAGE};
use sview_models::{AnalysisId, AnalysisJob, AnalysisStatus, StatusResponse};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::poller::{PollControl, Poller};
use crate::session::QuotaSession;

/// Side effects the presentation layer has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Open the results view for a completed analysis.
    NavigateToResults(AnalysisId),
}

struct ControllerState {
    job: Option<AnalysisJob>,
    generation: u64,
    poller: Poller,
    redirect: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl ControllerState {
    fn cancel_redirect(&mut self) {
        if let Some(redirect) = self.redirect.take() {
            redirect.abort();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.shut_down && self.generation == generation
    }
}

struct Inner {
    api: Arc<dyn AnalysisApi>,
    session: Arc<dyn QuotaSession>,
    config: TrackerConfig,
    state: Mutex<ControllerState>,
    snapshots: watch::Sender<Option<AnalysisJob>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ControllerState) {
        self.snapshots.send_replace(state.job.clone());
    }
}

/// Controller for a single video submission at a time.
pub struct UploadController {
    inner: Arc<Inner>,
}

impl UploadController {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        session: Arc<dyn QuotaSession>,
        config: TrackerConfig,
    ) -> Self {
        let (snapshots, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        let poller = Poller::from_config(&config);

        Self {
            inner: Arc::new(Inner {
                api,
                session,
                config,
                state: Mutex::new(ControllerState {
                    job: None,
                    generation: 0,
                    poller,
                    redirect: None,
                    shut_down: false,
                }),
                snapshots,
                events,
            }),
        }
    }

    /// Current job, `None` while idle.
    pub fn snapshot(&self) -> Option<AnalysisJob> {
        self.inner.lock().job.clone()
    }

    /// Receive a snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<AnalysisJob>> {
        self.inner.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    /// Check if a status poll is scheduled.
    pub fn is_polling(&self) -> bool {
        self.inner.lock().poller.is_active()
    }

    /// Submit a video and start tracking it.
    ///
    /// Only the quota gate (and a shut-down controller) produce an error;
    /// it fires before any request is made. Upload failures end up in the
    /// job as a `failed` status instead.
    pub async fn start_upload(&self, upload: VideoUpload) -> TrackerResult<()> {
        let quota = self.inner.session.quota();
        if !quota.allows_submission() {
            warn!(
                quota_remaining = quota.quota_remaining,
                plan_quota = quota.plan_quota,
                "Upload refused: quota exhausted"
            );
            return Err(TrackerError::QuotaExceeded {
                remaining: quota.quota_remaining,
                plan_quota: quota.plan_quota,
            });
        }

        let generation = {
            let mut state = self.inner.lock();
            if state.shut_down {
                return Err(TrackerError::Inactive);
            }
            state.poller.cancel();
            state.cancel_redirect();
            state.generation += 1;
            state.job = Some(AnalysisJob::uploading(upload.size_bytes()));
            self.inner.publish(&state);
            state.generation
        };

        info!(
            file_name = %upload.file_name,
            size_bytes = upload.size_bytes(),
            "Starting upload"
        );
        let result = self.inner.api.submit(&upload).await;

        let mut state = self.inner.lock();
        if !state.is_current(generation) {
            debug!("Discarding upload result for an abandoned job");
            return Ok(());
        }
        let Some(job) = state.job.as_mut() else {
            return Ok(());
        };

        match result {
            Ok(accepted) => {
                info!(analysis_id = %accepted.id, "Upload accepted, tracking analysis");
                job.mark_processing(accepted.id.clone());
                self.inner.publish(&state);
                start_polling(&self.inner, &mut state, accepted.id, generation);
            }
            Err(e) => {
                error!("Upload failed: {}", e);
                job.fail(e.server_message().map(str::to_string), UPLOAD_FAILED_MESSAGE);
                self.inner.publish(&state);
            }
        }

        Ok(())
    }

    /// Acknowledge a finished job and return to idle.
    ///
    /// Ignored (returns `false`) while the job is still running. A pending
    /// navigation to the results view is kept.
    pub fn dismiss(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.job.as_ref().is_some_and(AnalysisJob::is_terminal) {
            return false;
        }
        state.poller.cancel();
        state.generation += 1;
        state.job = None;
        self.inner.publish(&state);
        true
    }

    /// Tear down: stop polling, drop any pending navigation, forget the job.
    ///
    /// Requests already in flight finish but their results are ignored.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        state.poller.cancel();
        state.cancel_redirect();
        state.job = None;
        self.inner.publish(&state);
        debug!("Upload controller shut down");
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn start_polling(
    inner: &Arc<Inner>,
    state: &mut ControllerState,
    id: AnalysisId,
    generation: u64,
) {
    let api = Arc::clone(&inner.api);
    let poll_id = id.clone();
    let weak: Weak<Inner> = Arc::downgrade(inner);

    state.poller.start(
        format!("upload:{}", id),
        move || {
            let api = Arc::clone(&api);
            let id = poll_id.clone();
            async move { api.get_status(&id).await }
        },
        move |status: StatusResponse| match weak.upgrade() {
            Some(inner) => apply_status(&inner, generation, &id, status),
            None => PollControl::Stop,
        },
    );
}

fn apply_status(
    inner: &Arc<Inner>,
    generation: u64,
    id: &AnalysisId,
    status: StatusResponse,
) -> PollControl {
    let mut state = inner.lock();
    if !state.is_current(generation) {
        return PollControl::Stop;
    }
    let Some(job) = state.job.as_mut() else {
        return PollControl::Stop;
    };

    match status.status {
        AnalysisStatus::Completed => {
            job.complete();
            info!(analysis_id = %id, "Analysis completed");
            inner.publish(&state);

            let session = Arc::clone(&inner.session);
            tokio::spawn(async move { session.refresh().await });

            let delay = inner.config.redirect_delay;
            let events = inner.events.clone();
            let target = id.clone();
            state.redirect = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(ControllerEvent::NavigateToResults(target));
            }));
            PollControl::Stop
        }
        AnalysisStatus::Failed => {
            warn!(
                analysis_id = %id,
                error = status.error_message.as_deref().unwrap_or("none"),
                "Analysis failed"
            );
            job.fail(status.error_message, PROCESSING_FAILED_MESSAGE);
            inner.publish(&state);
            PollControl::Stop
        }
        other => {
            debug!(analysis_id = %id, status = %other, "Analysis still running");
            job.advance_progress();
            inner.publish(&state);
            PollControl::Continue
        }
    }
}
