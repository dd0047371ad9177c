//! # pulsereader-core
//!
//! Real-time duty cycle and period measurement for edge-triggered pulse-train inputs.
//!
//! The crate turns a stream of timestamped logic-level transitions into filtered,
//! low-jitter duty/period estimates for up to [`MAX_CHANNELS`] independent lines.
//! Three execution contexts drive it:
//!
//! - **Trigger context** calls [`Engine::on_edge`] once per electrical transition.
//! - **Tick context** calls [`Engine::on_tick`] once per tick period.
//! - **Query/configuration context** adds and removes channels, changes the tick
//!   period and polls [`Engine::query`] or [`Engine::query_batch`].
//!
//! All three serialize on a single short critical section owned by the [`Engine`].
//!
//! ## Safety Guarantees
//!
//! - **No heap allocations** in `on_edge`, `on_tick`, `query` and `query_batch`
//! - **No blocking** inside the critical section, no logging while it is held
//! - **Bounded execution time**: at most [`MAX_CHANNELS`] slots, at most
//!   [`MAX_FILTER_WINDOW`] samples per phase buffer
//!
//! ## Architecture
//!
//! - [`table`] - fixed-capacity channel registry keyed by line id
//! - [`capture`] - edge capture, files pulse widths into the phase buffers
//! - [`monitor`] - stall monitor, carries partial pulses across ticks
//! - [`filter`] - median aggregation of the phase buffers
//! - [`engine`] - the guarded engine binding the above together
//! - [`counters`] - lock-free engine counters
//! - [`config`] - engine configuration and clamping rules
//! - [`time`] - monotonic timestamps and logic levels
//! - [`error`] - error taxonomy
//!
//! ## Example
//!
//! ```rust
//! use pulsereader_core::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default());
//! engine.add_channel(25, 3)?;
//!
//! // 10 ms high, 10 ms low, starting with a rising edge at t = 0.
//! for (i, level) in [1, 0, 1, 0, 1, 0].into_iter().enumerate() {
//!     engine.on_edge(25, level, Timestamp::from_millis(10 * i as u64))?;
//! }
//!
//! let estimate = engine.query(25).ok_or("channel missing")?;
//! assert!(estimate.valid);
//! assert_eq!(estimate.duty_ns, 10_000_000);
//! assert_eq!(estimate.period_ns, 20_000_000);
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

pub mod capture;
pub mod channel;
pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod filter;
pub mod monitor;
pub mod table;
pub mod time;

pub mod prelude;

pub use capture::{EdgeOutcome, Phase};
pub use channel::ChannelStatus;
pub use config::{
    DEFAULT_FILTER_WINDOW, DEFAULT_TICK_PERIOD_MS, EngineConfig, EngineConfigBuilder, Estimator,
    MAX_CHANNELS, MAX_FILTER_WINDOW, MAX_PULSE_WIDTH, MAX_TICK_PERIOD_MS, MIN_FILTER_WINDOW,
    MIN_TICK_PERIOD_MS,
};
pub use counters::{CounterSnapshot, EngineCounters};
pub use engine::{Engine, IoStat, TickSummary};
pub use error::{PulseError, PulseResult};
pub use filter::Estimate;
pub use monitor::TickOutcome;
pub use table::ChannelHandle;
pub use time::{Level, LineId, Timestamp};
