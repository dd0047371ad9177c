//! Prelude for pulsereader-service.
//!
//! Re-exports the service types together with the engine prelude.

pub use pulsereader_core::prelude::*;

pub use crate::config::{ChannelConfig, ConfigFormat, ServiceConfig};
pub use crate::error::{ServiceError, ServiceResult};
pub use crate::replay::{ChannelEstimate, EdgeRecord, ReplaySession, ReplaySummary};
pub use crate::service::{PulseReader, ReaderStatus};
pub use crate::sim::{PwmSource, merge_until};
