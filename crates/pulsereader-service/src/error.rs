//! Error types for the service crate.

use pulsereader_core::{LineId, PulseError};
use pulsereader_scheduler::SchedulerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the service, configuration loading and replay.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The engine rejected an operation.
    #[error(transparent)]
    Engine(#[from] PulseError),

    /// The tick thread could not be started, restarted or stopped.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Reading a file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed or failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file extension is not `.yaml`, `.yml` or `.json`.
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// A line of an edge log is not a valid record.
    #[error("Malformed edge record on line {line_no}: {message}")]
    Parse {
        /// 1-based line number in the log.
        line_no: usize,
        /// Parser message.
        message: String,
    },

    /// An edge record is earlier than the one before it.
    #[error("Edge record on line {line_no} goes back in time: {t_ns}ns after {previous_ns}ns")]
    OutOfOrder {
        /// 1-based line number (or record number) of the offending record.
        line_no: usize,
        /// Its timestamp.
        t_ns: u64,
        /// Timestamp of the previous record.
        previous_ns: u64,
    },

    /// A synthetic source was given an impossible waveform.
    #[error("Invalid PWM source on line {line}: {reason}")]
    InvalidSource {
        /// Line the source drives.
        line: LineId,
        /// What is wrong with it.
        reason: String,
    },
}

impl ServiceError {
    /// Create an I/O error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create an invalid source error.
    #[must_use]
    pub fn invalid_source(line: LineId, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            line,
            reason: reason.into(),
        }
    }

    /// The engine error behind this error, if any.
    #[must_use]
    pub fn as_engine(&self) -> Option<&PulseError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the error was caused by bad input (configuration, logs, sources).
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::Engine(PulseError::InvalidConfig(_))
                | Self::Config(_)
                | Self::UnsupportedFormat(_)
                | Self::Parse { .. }
                | Self::OutOfOrder { .. }
                | Self::InvalidSource { .. }
        )
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
