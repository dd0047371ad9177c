//! # pulsereader-service
//!
//! Runs the pulse capture engine for real and on a virtual clock.
//!
//! - [`service`] - [`PulseReader`]: a shared engine plus the thread that
//!   ticks its stall monitor
//! - [`replay`] - [`ReplaySession`]: deterministic replay of edge logs with
//!   ticks injected at exact boundaries
//! - [`sim`] - [`PwmSource`]: seeded synthetic PWM waveforms
//! - [`config`] - YAML/JSON service configuration
//!
//! ## Example
//!
//! ```rust
//! use pulsereader_service::prelude::*;
//! use std::time::Duration;
//!
//! let mut session = ReplaySession::new(EngineConfig::default());
//! session.engine().add_channel(25, 3)?;
//!
//! let source = PwmSource::new(25, Duration::from_millis(4), Duration::from_millis(16))?;
//! session.feed_all(source.take(20))?;
//!
//! let summary = session.finish(None);
//! let channel = summary.estimates.first().ok_or("no estimate")?;
//! assert!(channel.estimate.valid);
//! assert_eq!(channel.estimate.duty_ns, 4_000_000);
//! assert_eq!(channel.estimate.period_ns, 16_000_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod replay;
pub mod service;
pub mod sim;

pub mod prelude;

pub use config::{ChannelConfig, ConfigFormat, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use replay::{ChannelEstimate, EdgeRecord, ReplaySession, ReplaySummary, read_records};
pub use service::{PulseReader, ReaderStatus};
pub use sim::{PwmSource, merge_until};
