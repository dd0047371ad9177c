//! Tick lateness tracking.
//!
//! Lateness is how far after its absolute deadline a tick actually fired.
//! Recent samples are kept in a fixed ring buffer so percentile queries never
//! allocate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of recent lateness samples retained for percentile calculation.
pub const LATENESS_SAMPLES: usize = 256;

/// Snapshot of a ticker's timing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickStats {
    /// Ticks delivered to the handler.
    pub total_ticks: u64,
    /// Deadlines skipped because the handler overran them.
    pub overruns: u64,
    /// Worst lateness seen, in nanoseconds.
    pub max_lateness_ns: u64,
    /// Lateness of the most recent tick, in nanoseconds.
    pub last_lateness_ns: u64,
    /// Median lateness over the recent window, in nanoseconds.
    pub p50_lateness_ns: u64,
    /// 99th percentile lateness over the recent window, in nanoseconds.
    pub p99_lateness_ns: u64,
}

/// Lateness recorder owned by a ticker.
///
/// # RT-Safety
///
/// - `record_tick` is O(1) and allocation-free
/// - Percentiles select on a stack copy of the ring buffer
#[derive(Debug, Clone)]
pub struct TickMetrics {
    total_ticks: u64,
    overruns: u64,
    max_lateness_ns: u64,
    last_lateness_ns: u64,
    samples: [u64; LATENESS_SAMPLES],
    filled: usize,
    next_sample_index: usize,
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TickMetrics {
    /// Create an empty recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_ticks: 0,
            overruns: 0,
            max_lateness_ns: 0,
            last_lateness_ns: 0,
            samples: [0; LATENESS_SAMPLES],
            filled: 0,
            next_sample_index: 0,
        }
    }

    /// Record a delivered tick.
    pub fn record_tick(&mut self, lateness: Duration) {
        let lateness_ns = u64::try_from(lateness.as_nanos()).unwrap_or(u64::MAX);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.max_lateness_ns = self.max_lateness_ns.max(lateness_ns);
        self.last_lateness_ns = lateness_ns;

        if let Some(slot) = self.samples.get_mut(self.next_sample_index) {
            *slot = lateness_ns;
        }
        self.next_sample_index = (self.next_sample_index + 1) % LATENESS_SAMPLES;
        self.filled = (self.filled + 1).min(LATENESS_SAMPLES);
    }

    /// Record deadlines skipped after an overrun.
    pub fn record_overruns(&mut self, skipped: u64) {
        self.overruns = self.overruns.saturating_add(skipped);
    }

    /// Lateness percentile over the recent window, `permille` in `[0, 1000]`.
    ///
    /// Returns 0 if no tick has been recorded.
    #[must_use]
    pub fn percentile_lateness_ns(&self, permille: u32) -> u64 {
        let mut scratch = self.samples;
        let Some(window) = scratch.get_mut(..self.filled) else {
            return 0;
        };
        if window.is_empty() {
            return 0;
        }

        let len = window.len();
        let permille = usize::try_from(permille.min(1000)).unwrap_or(1000);
        let index = (len * permille / 1000).min(len - 1);
        let (_, value, _) = window.select_nth_unstable(index);
        *value
    }

    /// Copy the current statistics.
    #[must_use]
    pub fn snapshot(&self) -> TickStats {
        TickStats {
            total_ticks: self.total_ticks,
            overruns: self.overruns,
            max_lateness_ns: self.max_lateness_ns,
            last_lateness_ns: self.last_lateness_ns,
            p50_lateness_ns: self.percentile_lateness_ns(500),
            p99_lateness_ns: self.percentile_lateness_ns(990),
        }
    }
}
