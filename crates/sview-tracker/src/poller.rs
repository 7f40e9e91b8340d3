//! Fixed-interval status polling.
//!
//! One `Poller` owns at most one polling loop. Starting a new loop cancels
//! the previous one first. Cancellation only stops the timer: a request
//! already in flight runs to completion and its result is dropped.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sview_models::HasStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::TrackerConfig;

/// What the result handler wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

struct ActivePoll {
    cancel: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

/// Owned, cancellable polling handle.
pub struct Poller {
    interval: Duration,
    max_logged_failures: u32,
    active: Option<ActivePoll>,
}

impl Poller {
    pub fn new(interval: Duration, max_logged_failures: u32) -> Self {
        Self {
            interval,
            max_logged_failures,
            active: None,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.poll_interval, config.max_logged_poll_failures)
    }

    /// Start polling, replacing any loop that is already running.
    ///
    /// `fetch` runs once per tick, the first tick one interval from now.
    /// Successful results go to `on_result`; the loop ends when the
    /// handler returns [`PollControl::Stop`] or the result is terminal.
    /// Fetch errors are logged and retried on the next tick.
    pub fn start<F, Fut, T, E, H>(&mut self, label: impl Into<String>, fetch: F, on_result: H)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: HasStatus + Send + 'static,
        E: Display + Send + 'static,
        H: FnMut(T) -> PollControl + Send + 'static,
    {
        self.cancel();

        let (cancel, cancel_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(poll_loop(
            label.into(),
            self.interval,
            self.max_logged_failures,
            cancel_rx,
            Arc::clone(&running),
            fetch,
            on_result,
        ));

        self.active = Some(ActivePoll {
            cancel,
            running,
            _task: task,
        });
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.running.store(false, Ordering::SeqCst);
            let _ = active.cancel.send(true);
        }
    }

    /// Check if a loop is still scheduling polls.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.running.load(Ordering::SeqCst))
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn poll_loop<F, Fut, T, E, H>(
    label: String,
    period: Duration,
    max_logged_failures: u32,
    mut cancel_rx: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
    mut fetch: F,
    mut on_result: H,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: HasStatus,
    E: Display,
    H: FnMut(T) -> PollControl,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = TransientFailures::new(max_logged_failures);

    debug!(poll = %label, "Polling started (interval: {:?})", period);

    loop {
        tokio::select! {
            biased;
            // Err means the handle is gone, which also cancels.
            _ = cancel_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = fetch().await;

        if *cancel_rx.borrow() {
            debug!(poll = %label, "Discarding poll result after cancellation");
            break;
        }

        match result {
            Ok(value) => {
                failures.record_success(&label);
                let terminal = value.status().is_terminal();
                if terminal {
                    running.store(false, Ordering::SeqCst);
                }
                if on_result(value) == PollControl::Stop || terminal {
                    break;
                }
            }
            Err(e) => {
                if failures.record_failure(&label) {
                    warn!(poll = %label, "Polling error, retrying next tick: {}", e);
                }
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!(poll = %label, "Polling stopped");
}

/// Consecutive transient failures, with log suppression after a threshold.
#[derive(Debug)]
struct TransientFailures {
    consecutive: u32,
    max_logged: u32,
}

impl TransientFailures {
    fn new(max_logged: u32) -> Self {
        Self {
            consecutive: 0,
            max_logged,
        }
    }

    fn record_success(&mut self, label: &str) {
        if self.consecutive > self.max_logged {
            debug!(
                poll = %label,
                "Polling recovered after {} consecutive failures", self.consecutive
            );
        }
        self.consecutive = 0;
    }

    /// Returns `true` if this failure should be logged.
    fn record_failure(&mut self, label: &str) -> bool {
        self.consecutive += 1;
        if self.consecutive == self.max_logged + 1 {
            warn!(
                poll = %label,
                "Suppressing further polling errors after {} consecutive failures",
                self.max_logged
            );
        }
        self.consecutive <= self.max_logged
    }
}
