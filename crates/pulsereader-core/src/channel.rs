//! Per-channel capture state.
//!
//! A [`Channel`] lives in a fixed slot of the channel table. Its phase buffers
//! are fixed arrays of [`MAX_FILTER_WINDOW`] samples of which only the first
//! `filter_window` are used.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{Estimator, MAX_FILTER_WINDOW};
use crate::filter::{self, Estimate};
use crate::time::{Level, LineId, Timestamp};

/// Circular buffer of pulse widths for one phase (high or low).
#[derive(Debug, Clone, Copy)]
pub(crate) struct PhaseBuffer {
    samples: [Duration; MAX_FILTER_WINDOW],
    write_index: usize,
    filled: usize,
}

impl PhaseBuffer {
    pub(crate) const EMPTY: Self = Self {
        samples: [Duration::ZERO; MAX_FILTER_WINDOW],
        write_index: 0,
        filled: 0,
    };

    /// Overwrite the oldest slot and advance the cursor modulo `window`.
    pub(crate) fn push(&mut self, width: Duration, window: usize) {
        if let Some(slot) = self.samples.get_mut(self.write_index) {
            *slot = width;
        }
        self.write_index = (self.write_index + 1) % window.max(1);
        self.filled = (self.filled + 1).min(window);
    }

    /// Like [`PhaseBuffer::push`] but the slot does not count as an observed
    /// pulse. The cursor moves on, so a full window of real pulses overwrites it.
    pub(crate) fn push_placeholder(&mut self, width: Duration, window: usize) {
        if let Some(slot) = self.samples.get_mut(self.write_index) {
            *slot = width;
        }
        self.write_index = (self.write_index + 1) % window.max(1);
    }

    pub(crate) fn window(&self, window: usize) -> &[Duration] {
        self.samples.get(..window).unwrap_or(&[])
    }

    pub(crate) fn write_index(&self) -> usize {
        self.write_index
    }

    pub(crate) fn filled(&self) -> usize {
        self.filled
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::EMPTY;
    }
}

/// One slot of the channel table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Channel {
    pub(crate) line: LineId,
    pub(crate) filter_window: usize,
    pub(crate) active: bool,
    pub(crate) level: Level,
    pub(crate) high: PhaseBuffer,
    pub(crate) low: PhaseBuffer,
    pub(crate) last_edge: Timestamp,
    pub(crate) carry: Duration,
    pub(crate) stalled: bool,
    pub(crate) published: Estimate,
}

impl Channel {
    pub(crate) const VACANT: Self = Self {
        line: 0,
        filter_window: 1,
        active: false,
        level: Level::Low,
        high: PhaseBuffer::EMPTY,
        low: PhaseBuffer::EMPTY,
        last_edge: Timestamp::ZERO,
        carry: Duration::ZERO,
        stalled: true,
        published: Estimate::INVALID,
    };

    /// Clear buffers, cursors, carry and last-edge time and mark the channel as
    /// having no signal. Keeps `level`, `line`, `filter_window` and `active`.
    pub(crate) fn reset_transient(&mut self) {
        self.high.clear();
        self.low.clear();
        self.last_edge = Timestamp::ZERO;
        self.carry = Duration::ZERO;
        self.stalled = true;
        self.published = Estimate::INVALID;
    }

    /// Transient reset plus the stored level.
    pub(crate) fn reset_zero(&mut self) {
        self.reset_transient();
        self.level = Level::Low;
    }

    /// Both buffers hold a full window of samples and the signal is present.
    pub(crate) fn is_ready(&self) -> bool {
        !self.stalled
            && self.high.filled() >= self.filter_window
            && self.low.filled() >= self.filter_window
    }

    pub(crate) fn estimate(&self, estimator: Estimator) -> Estimate {
        if !self.is_ready() {
            return Estimate::INVALID;
        }
        match estimator {
            Estimator::OnDemand => filter::aggregate(
                self.high.window(self.filter_window),
                self.low.window(self.filter_window),
            ),
            Estimator::Periodic => self.published,
        }
    }

    /// Recompute the published estimate (periodic estimator only).
    pub(crate) fn publish(&mut self) {
        self.published = if self.is_ready() {
            filter::aggregate_paired(
                self.high.window(self.filter_window),
                self.low.window(self.filter_window),
            )
        } else {
            Estimate::INVALID
        };
    }

    pub(crate) fn status(&self) -> ChannelStatus {
        ChannelStatus {
            line: self.line,
            filter_window: self.filter_window,
            level: self.level,
            stalled: self.stalled,
            carry: self.carry,
            last_edge: self.last_edge,
            high_filled: self.high.filled(),
            low_filled: self.low.filled(),
            write_index_high: self.high.write_index(),
            write_index_low: self.low.write_index(),
        }
    }
}

/// Diagnostic copy of a channel's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Line the channel is bound to.
    pub line: LineId,
    /// Median filter window.
    pub filter_window: usize,
    /// Last observed level.
    pub level: Level,
    /// No signal: estimates are invalid until an edge resumes it.
    pub stalled: bool,
    /// Partial pulse carried across ticks.
    pub carry: Duration,
    /// Time of the last recorded edge or tick boundary.
    pub last_edge: Timestamp,
    /// High-phase samples written since the last reset, capped at the window.
    pub high_filled: usize,
    /// Low-phase samples written since the last reset, capped at the window.
    pub low_filled: usize,
    /// Next high-phase slot to overwrite.
    pub write_index_high: usize,
    /// Next low-phase slot to overwrite.
    pub write_index_low: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_buffer_wraps() {
        let mut buffer = PhaseBuffer::EMPTY;
        for i in 1..=4 {
            buffer.push(Duration::from_millis(i), 3);
        }
        assert_eq!(buffer.write_index(), 1);
        assert_eq!(buffer.filled(), 3);
        assert_eq!(
            buffer.window(3),
            &[
                Duration::from_millis(4),
                Duration::from_millis(2),
                Duration::from_millis(3)
            ]
        );
    }

    #[test]
    fn test_placeholder_is_not_counted_and_gets_overwritten() {
        let mut buffer = PhaseBuffer::EMPTY;
        buffer.push_placeholder(Duration::ZERO, 2);
        assert_eq!(buffer.filled(), 0);
        assert_eq!(buffer.write_index(), 1);

        buffer.push(Duration::from_millis(5), 2);
        assert_eq!(buffer.filled(), 1);
        buffer.push(Duration::from_millis(6), 2);
        assert_eq!(buffer.filled(), 2);
        assert_eq!(
            buffer.window(2),
            &[Duration::from_millis(6), Duration::from_millis(5)]
        );
    }

    #[test]
    fn test_reset_transient_keeps_level() {
        let mut channel = Channel::VACANT;
        channel.level = Level::High;
        channel.stalled = false;
        channel.carry = Duration::from_millis(4);
        channel.high.push(Duration::from_millis(1), 1);

        channel.reset_transient();
        assert_eq!(channel.level, Level::High);
        assert!(channel.stalled);
        assert_eq!(channel.carry, Duration::ZERO);
        assert_eq!(channel.high.filled(), 0);

        channel.reset_zero();
        assert_eq!(channel.level, Level::Low);
    }

    #[test]
    fn test_not_ready_is_invalid() {
        let mut channel = Channel::VACANT;
        channel.stalled = false;
        channel.filter_window = 2;
        channel.high.push(Duration::from_millis(1), 2);
        channel.low.push(Duration::from_millis(1), 2);
        assert_eq!(channel.estimate(Estimator::OnDemand), Estimate::INVALID);
    }
}
