//! Error types for the scheduler crate.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while starting, restarting or stopping a ticker.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The tick period was zero.
    #[error("Invalid tick period: {0:?}")]
    InvalidPeriod(Duration),

    /// The tick thread could not be spawned.
    #[error("Failed to spawn tick thread: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// The tick handler panicked; the ticker is dead and cannot be restarted.
    #[error("Tick thread panicked")]
    ThreadPanicked,
}

impl SchedulerError {
    /// Create an invalid period error.
    #[must_use]
    pub fn invalid_period(period: Duration) -> Self {
        Self::InvalidPeriod(period)
    }
}

/// A specialized `Result` type for scheduler operations.
pub type SchedulerResult<T = ()> = std::result::Result<T, SchedulerError>;
