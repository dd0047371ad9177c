//! Median aggregation of the phase buffers.
//!
//! Aggregation always works on a stack copy of a buffer. The live buffers are
//! indexed by their write cursors and must never be reordered.
//!
//! # RT Safety
//!
//! - No heap allocations: scratch space is a `[Duration; MAX_FILTER_WINDOW]` on the stack
//! - O(window) selection per phase, window is at most [`MAX_FILTER_WINDOW`]

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::MAX_FILTER_WINDOW;

/// Filtered duty/period estimate of one channel, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Estimate {
    /// High-phase width.
    pub duty_ns: u64,
    /// Full cycle (high + low) width.
    pub period_ns: u64,
    /// False while the channel is stalled or its buffers are not yet full.
    pub valid: bool,
}

impl Estimate {
    /// The estimate reported for stalled or not yet filled channels.
    pub const INVALID: Self = Self {
        duty_ns: 0,
        period_ns: 0,
        valid: false,
    };

    /// Build a valid estimate from durations.
    #[must_use]
    pub fn from_durations(duty: Duration, period: Duration) -> Self {
        Self {
            duty_ns: saturating_nanos(duty),
            period_ns: saturating_nanos(period),
            valid: true,
        }
    }

    /// High-phase width as a `Duration`.
    #[must_use]
    pub fn duty(&self) -> Duration {
        Duration::from_nanos(self.duty_ns)
    }

    /// Cycle width as a `Duration`.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns)
    }

    /// `(duty_us, cycle_us)` as the earlier microsecond interface reported them.
    #[must_use]
    pub fn to_legacy_micros(&self) -> (u32, u32) {
        let to_us = |ns: u64| u32::try_from(ns / 1_000).unwrap_or(u32::MAX);
        (to_us(self.duty_ns), to_us(self.period_ns))
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Median of `samples`: the element at index `len / 2` once sorted ascending.
///
/// Returns `Duration::ZERO` for an empty slice. Only the first
/// [`MAX_FILTER_WINDOW`] samples are considered.
#[must_use]
pub fn median(samples: &[Duration]) -> Duration {
    let mut scratch = [Duration::ZERO; MAX_FILTER_WINDOW];
    let len = samples.len().min(MAX_FILTER_WINDOW);
    let (Some(window), Some(source)) = (scratch.get_mut(..len), samples.get(..len)) else {
        return Duration::ZERO;
    };
    if window.is_empty() {
        return Duration::ZERO;
    }
    window.copy_from_slice(source);
    let (_, median, _) = window.select_nth_unstable(len / 2);
    *median
}

/// Median of the per-slot sums `high[i] + low[i]`.
#[must_use]
pub fn median_of_sums(high: &[Duration], low: &[Duration]) -> Duration {
    let mut sums = [Duration::ZERO; MAX_FILTER_WINDOW];
    let mut len = 0;
    for (slot, (h, l)) in sums.iter_mut().zip(high.iter().zip(low)) {
        *slot = h.saturating_add(*l);
        len += 1;
    }
    sums.get(..len).map_or(Duration::ZERO, median)
}

/// Independent-median estimator: duty is the median high width, period is that
/// plus the median low width.
#[must_use]
pub fn aggregate(high: &[Duration], low: &[Duration]) -> Estimate {
    if let ([high], [low]) = (high, low) {
        return Estimate::from_durations(*high, high.saturating_add(*low));
    }
    let duty = median(high);
    Estimate::from_durations(duty, duty.saturating_add(median(low)))
}

/// Paired-cycle estimator: duty is the median high width, period is the median
/// of per-slot cycle sums.
#[must_use]
pub fn aggregate_paired(high: &[Duration], low: &[Duration]) -> Estimate {
    Estimate::from_durations(median(high), median_of_sums(high, low))
}
