//! Prelude module for common scheduler types.
//!
//! This module provides a convenient way to import the most commonly used
//! types from the scheduler crate.

pub use crate::error::{SchedulerError, SchedulerResult};
pub use crate::stats::{TickMetrics, TickStats};
pub use crate::ticker::{PeriodicTicker, TickHandler};
