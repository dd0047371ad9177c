//! Prelude for pulsereader-core.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use pulsereader_core::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default());
//! engine.add_channel(4, DEFAULT_FILTER_WINDOW)?;
//!
//! engine.on_edge_level(4, Level::High, Timestamp::from_millis(1))?;
//! let summary = engine.on_tick(Timestamp::from_millis(10));
//! assert!(summary.stalled_lines().is_empty());
//! # Ok::<(), PulseError>(())
//! ```

pub use crate::capture::{EdgeOutcome, Phase};
pub use crate::channel::ChannelStatus;
pub use crate::config::{
    DEFAULT_FILTER_WINDOW, DEFAULT_TICK_PERIOD_MS, EngineConfig, EngineConfigBuilder, Estimator,
    MAX_CHANNELS, MAX_FILTER_WINDOW, MAX_PULSE_WIDTH,
};
pub use crate::counters::{CounterSnapshot, EngineCounters};
pub use crate::engine::{Engine, IoStat, TickSummary};
pub use crate::error::{PulseError, PulseResult};
pub use crate::filter::Estimate;
pub use crate::monitor::TickOutcome;
pub use crate::table::ChannelHandle;
pub use crate::time::{Level, LineId, Timestamp};
