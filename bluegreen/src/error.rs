use bluegreen_core::InvalidConfig;
use thiserror::Error;

/// Errors surfaced synchronously by [`crate::Orchestrator::start`] and
/// [`crate::Orchestrator::start_write_only`]. Both are rejected before any
/// side effect; in particular, statistics are untouched.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("a workload run is already in progress")]
    AlreadyRunning,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] InvalidConfig),
}
