//! Edge capture.
//!
//! Invoked once per electrical transition. The width since the previous
//! transition (plus any carry left by the stall monitor) closes the phase the
//! line just left: a falling edge closes a high pulse, a rising edge closes a
//! low pulse.
//!
//! # RT Safety
//!
//! - O(1), no heap allocations
//! - Mutates only the addressed channel

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::channel::Channel;
use crate::time::{Level, Timestamp};

/// Phase of a pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Line held at logic 1.
    High,
    /// Line held at logic 0.
    Low,
}

impl Phase {
    /// Phase closed by an edge that leaves the line at `level`.
    #[must_use]
    pub const fn closed_by(level: Level) -> Self {
        match level {
            Level::Low => Self::High,
            Level::High => Self::Low,
        }
    }
}

/// What an edge did to its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// A pulse width was filed into the phase buffer.
    Recorded {
        /// Phase the width was filed under.
        phase: Phase,
        /// Width including any carry.
        width: Duration,
    },
    /// First edge after a stall. A zero width was filed and the channel is live again.
    Resumed {
        /// Phase the zero width was filed under.
        phase: Phase,
    },
    /// Same level as the stored one; nothing changed.
    Duplicate,
}

impl Channel {
    pub(crate) fn capture_edge(&mut self, level: Level, now: Timestamp) -> EdgeOutcome {
        if level == self.level {
            return EdgeOutcome::Duplicate;
        }
        self.level = level;

        let phase = Phase::closed_by(level);

        if self.stalled {
            // dead time before a resuming edge is not a pulse
            self.stalled = false;
            self.carry = Duration::ZERO;
            self.last_edge = now;
            let buffer = match phase {
                Phase::High => &mut self.high,
                Phase::Low => &mut self.low,
            };
            buffer.push_placeholder(Duration::ZERO, self.filter_window);
            return EdgeOutcome::Resumed { phase };
        }

        // A tick that took the lock first may have moved `last_edge` past
        // `now`; the carry it snapshotted already covers that overshoot.
        let width = self
            .carry
            .saturating_add(now.saturating_duration_since(self.last_edge))
            .saturating_sub(self.last_edge.saturating_duration_since(now));

        // With a carry pending, `last_edge` is a tick boundary and the edge
        // itself is the true start of the next pulse. Otherwise it is the
        // previous edge and must not move backwards.
        self.last_edge = if self.carry.is_zero() {
            self.last_edge.max(now)
        } else {
            now
        };
        self.carry = Duration::ZERO;

        match phase {
            Phase::High => self.high.push(width, self.filter_window),
            Phase::Low => self.low.push(width, self.filter_window),
        }
        EdgeOutcome::Recorded { phase, width }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_channel(window: usize) -> Channel {
        let mut channel = Channel::VACANT;
        channel.active = true;
        channel.filter_window = window;
        channel
    }

    #[test]
    fn test_first_edge_resumes_with_zero_width() {
        let mut channel = live_channel(3);
        let outcome = channel.capture_edge(Level::High, Timestamp::from_millis(50));
        assert_eq!(outcome, EdgeOutcome::Resumed { phase: Phase::Low });
        assert!(!channel.stalled);
        assert_eq!(channel.last_edge, Timestamp::from_millis(50));
        assert_eq!(channel.low.window(3).first(), Some(&Duration::ZERO));
        assert_eq!(channel.low.filled(), 0);
        assert_eq!(channel.low.write_index(), 1);
    }

    #[test]
    fn test_edge_stamped_before_tick_boundary() {
        let mut channel = live_channel(1);
        channel.capture_edge(Level::High, Timestamp::from_millis(0));
        // tick at 10 ms snapshotted the open high pulse
        channel.carry = Duration::from_millis(10);
        channel.last_edge = Timestamp::from_millis(10);

        let outcome = channel.capture_edge(Level::Low, Timestamp::from_millis(9));
        assert_eq!(
            outcome,
            EdgeOutcome::Recorded {
                phase: Phase::High,
                width: Duration::from_millis(9)
            }
        );
        assert_eq!(channel.last_edge, Timestamp::from_millis(9));
    }

    #[test]
    fn test_last_edge_never_moves_back_without_carry() {
        let mut channel = live_channel(1);
        channel.capture_edge(Level::High, Timestamp::from_millis(20));
        let outcome = channel.capture_edge(Level::Low, Timestamp::from_millis(15));
        assert_eq!(
            outcome,
            EdgeOutcome::Recorded {
                phase: Phase::High,
                width: Duration::ZERO
            }
        );
        assert_eq!(channel.last_edge, Timestamp::from_millis(20));
    }

    #[test]
    fn test_falling_edge_closes_high_pulse() {
        let mut channel = live_channel(3);
        channel.capture_edge(Level::High, Timestamp::from_millis(0));
        let outcome = channel.capture_edge(Level::Low, Timestamp::from_millis(7));
        assert_eq!(
            outcome,
            EdgeOutcome::Recorded {
                phase: Phase::High,
                width: Duration::from_millis(7)
            }
        );
        assert_eq!(channel.high.write_index(), 1);
        assert_eq!(channel.low.write_index(), 1);
    }

    #[test]
    fn test_duplicate_level_is_ignored() {
        let mut channel = live_channel(3);
        channel.capture_edge(Level::High, Timestamp::from_millis(0));
        let before = channel.status();
        let outcome = channel.capture_edge(Level::High, Timestamp::from_millis(4));
        assert_eq!(outcome, EdgeOutcome::Duplicate);
        assert_eq!(channel.status(), before);
    }

    #[test]
    fn test_carry_is_added_and_cleared() {
        let mut channel = live_channel(1);
        channel.capture_edge(Level::High, Timestamp::from_millis(0));
        channel.carry = Duration::from_millis(8);
        channel.last_edge = Timestamp::from_millis(10);
        let outcome = channel.capture_edge(Level::Low, Timestamp::from_millis(13));
        assert_eq!(
            outcome,
            EdgeOutcome::Recorded {
                phase: Phase::High,
                width: Duration::from_millis(11)
            }
        );
        assert_eq!(channel.carry, Duration::ZERO);
    }
}
