//! Lock-free engine counters.
//!
//! Incremented from the trigger and tick paths outside the critical section.
//! All counters use `Ordering::Relaxed`: values are eventually consistent and
//! individual counters are not synchronized with each other.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`EngineCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Edges that filed a width (including resuming edges).
    pub edges_recorded: u64,
    /// Edges discarded because the level did not change.
    pub edges_duplicate: u64,
    /// Edges reported for a line with no active channel.
    pub edges_unknown_line: u64,
    /// Invalid level reads.
    pub hardware_errors: u64,
    /// Stall monitor ticks.
    pub ticks: u64,
    /// Channels declared stalled.
    pub stalls: u64,
    /// Stalled channels brought back by an edge.
    pub resumes: u64,
    /// Channel lookups answered by `query` and `query_batch`.
    pub queries: u64,
}

/// Atomic counters shared by every execution context of an engine.
#[derive(Debug, Default)]
pub struct EngineCounters {
    edges_recorded: AtomicU64,
    edges_duplicate: AtomicU64,
    edges_unknown_line: AtomicU64,
    hardware_errors: AtomicU64,
    ticks: AtomicU64,
    stalls: AtomicU64,
    resumes: AtomicU64,
    queries: AtomicU64,
}

impl EngineCounters {
    /// Create counters initialized to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            edges_recorded: AtomicU64::new(0),
            edges_duplicate: AtomicU64::new(0),
            edges_unknown_line: AtomicU64::new(0),
            hardware_errors: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            stalls: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            queries: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_edge_recorded(&self) {
        self.edges_recorded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_edge_duplicate(&self) {
        self.edges_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_edge_unknown_line(&self) {
        self.edges_unknown_line.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_hardware_error(&self) {
        self.hardware_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_stalls(&self, count: u64) {
        self.stalls.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_queries(&self, count: u64) {
        self.queries.fetch_add(count, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            edges_recorded: self.edges_recorded.load(Ordering::Relaxed),
            edges_duplicate: self.edges_duplicate.load(Ordering::Relaxed),
            edges_unknown_line: self.edges_unknown_line.load(Ordering::Relaxed),
            hardware_errors: self.hardware_errors.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(EngineCounters::new().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = EngineCounters::new();
        counters.inc_edge_recorded();
        counters.inc_edge_recorded();
        counters.inc_edge_duplicate();
        counters.add_stalls(3);
        counters.add_queries(2);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.edges_recorded, 2);
        assert_eq!(snapshot.edges_duplicate, 1);
        assert_eq!(snapshot.stalls, 3);
        assert_eq!(snapshot.queries, 2);
        assert_eq!(snapshot.ticks, 0);
    }
}
