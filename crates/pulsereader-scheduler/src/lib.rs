//! Periodic tick context for the pulse capture engine.
//!
//! This crate provides the self-rearming periodic timer the stall monitor runs
//! on:
//!
//! - **PeriodicTicker**: a dedicated thread calling a handler at absolute
//!   deadlines, with synchronous cancel and restart at a new period
//! - **TickMetrics**: lateness and overrun tracking with percentile estimation
//!
//! # RT-Safety Guarantees
//!
//! - **No heap allocations** in the tick loop after the thread is spawned
//! - **Absolute deadlines**: handler run time does not accumulate as drift
//! - **Synchronous teardown**: `stop` and `set_period` join the old thread
//!   before returning
//!
//! # Example
//!
//! ```rust
//! use pulsereader_scheduler::prelude::*;
//! use std::time::Duration;
//!
//! let mut ticker = PeriodicTicker::start(Duration::from_millis(10), |_now| {
//!     // run the stall monitor here
//! })?;
//! ticker.set_period(Duration::from_millis(20))?;
//! ticker.stop()?;
//! # Ok::<(), SchedulerError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![deny(unused_must_use)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod stats;
pub mod ticker;

pub mod prelude;

pub use error::{SchedulerError, SchedulerResult};
pub use stats::{LATENESS_SAMPLES, TickMetrics, TickStats};
pub use ticker::{DEFAULT_THREAD_NAME, PeriodicTicker, TickHandler};
