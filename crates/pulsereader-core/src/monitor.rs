//! Stall monitor.
//!
//! Fires once per tick period for every active channel. A pulse still open at
//! a tick boundary is snapshotted into the channel's carry, and the carry keeps
//! growing by one tick period per tick until an edge closes the pulse. Once it
//! exceeds [`MAX_PULSE_WIDTH`] the signal is presumed absent and the channel is
//! reset and marked stalled.
//!
//! The last-edge time is moved to the tick boundary on every non-stalling tick
//! so the closing edge only measures the remainder since that boundary.

use std::time::Duration;

use crate::channel::Channel;
use crate::config::MAX_PULSE_WIDTH;
use crate::time::Timestamp;

/// What a tick did to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The channel was already stalled.
    Skipped,
    /// An edge closed a pulse since the last tick; the open remainder was snapshotted.
    Snapshot {
        /// Time since the last edge.
        carry: Duration,
    },
    /// No edge since the last tick; the carry grew by one tick period.
    Carried {
        /// Accumulated carry.
        carry: Duration,
    },
    /// The carry exceeded the maximum pulse width; the channel was reset.
    Stalled,
}

impl Channel {
    /// Run one stall monitor tick at `now`.
    ///
    /// A channel whose last edge was at `e` stalls on the first tick whose
    /// time exceeds `e + MAX_PULSE_WIDTH`, so the detection latency lies in
    /// `(MAX_PULSE_WIDTH, MAX_PULSE_WIDTH + tick_period]`. With 10 ms ticks
    /// that is the fourth tick after the edge, not the third.
    ///
    /// A tick stamped before an edge that already took the lock is treated
    /// as firing at that edge.
    pub(crate) fn advance_tick(&mut self, now: Timestamp, tick_period: Duration) -> TickOutcome {
        if self.stalled {
            return TickOutcome::Skipped;
        }
        let now = now.max(self.last_edge);

        let outcome = if self.carry.is_zero() {
            self.carry = now.saturating_duration_since(self.last_edge);
            TickOutcome::Snapshot { carry: self.carry }
        } else {
            self.carry = self.carry.saturating_add(tick_period);
            if self.carry > MAX_PULSE_WIDTH {
                self.reset_transient();
                return TickOutcome::Stalled;
            }
            TickOutcome::Carried { carry: self.carry }
        };

        self.last_edge = now;
        outcome
    }
}
