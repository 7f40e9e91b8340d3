//! Model error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown analysis status: {0}")]
    UnknownStatus(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),
}
