//! Error types for the pulse capture engine.
//!
//! Every failure is local to one channel or one call: none of these errors can
//! corrupt another channel's state or stop the tick and trigger paths.

use thiserror::Error;

use crate::time::LineId;

/// Errors that can occur during engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PulseError {
    /// All channel slots are active.
    #[error("Channel table full: all {capacity} slots are active")]
    CapacityExceeded {
        /// Number of slots in the table.
        capacity: usize,
    },

    /// No active channel is bound to the line.
    #[error("No active channel on line {0}")]
    NotFound(LineId),

    /// The level read back from the line was neither 0 nor 1.
    ///
    /// The channel has already been reset to its zero state when this is returned.
    #[error("Invalid level {raw} read from line {line}")]
    HardwareRead {
        /// Line the read was made on.
        line: LineId,
        /// Raw value returned by the hardware.
        raw: i32,
    },

    /// Configuration rejected by strict validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PulseError {
    /// Create a capacity exceeded error.
    #[must_use]
    pub fn capacity_exceeded(capacity: usize) -> Self {
        Self::CapacityExceeded { capacity }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(line: LineId) -> Self {
        Self::NotFound(line)
    }

    /// Create a hardware read error.
    #[must_use]
    pub fn hardware_read(line: LineId, raw: i32) -> Self {
        Self::HardwareRead { line, raw }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Line the error refers to, if any.
    #[must_use]
    pub fn line(&self) -> Option<LineId> {
        match self {
            Self::NotFound(line) | Self::HardwareRead { line, .. } => Some(*line),
            Self::CapacityExceeded { .. } | Self::InvalidConfig(_) => None,
        }
    }
}

/// A specialized `Result` type for engine operations.
pub type PulseResult<T> = std::result::Result<T, PulseError>;
