//! Upload/poll workflow for SkillsView video analyses.
//!
//! - [`UploadController`] drives one submission from file selection to a
//!   terminal status.
//! - [`ResultsViewer`] loads an analysis by id and keeps it fresh until the
//!   backend reports a terminal status.
//! - Both share the same [`Poller`]: fixed interval, one loop at a time,
//!   network errors retried silently.
//! - [`StatusView`] turns a job snapshot into what the status modal shows.

pub mod config;
pub mod controller;
pub mod error;
pub mod poller;
pub mod presentation;
pub mod session;
pub mod telemetry;
pub mod viewer;

pub use config::TrackerConfig;
pub use controller::{ControllerEvent, UploadController};
pub use error::{TrackerError, TrackerResult};
pub use poller::{PollControl, Poller};
pub use presentation::{StatusGlyph, StatusView};
pub use session::{ApiSession, QuotaSession};
pub use telemetry::init_tracing;
pub use viewer::{ResultsViewer, ViewerState};
