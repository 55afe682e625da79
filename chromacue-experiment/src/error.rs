use chromacue_core::TimelineError;
use thiserror::Error;

/// Faults surfaced by the experiment crate. Timeline faults indicate a bug
/// in trial construction and abort the run; IO and JSON faults come from
/// config loading and result writing.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
