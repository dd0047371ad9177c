//! Monotonic timestamps and logic levels.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Caller-chosen identifier of a monitored line (the hardware line number).
pub type LineId = u32;

static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

fn clock_anchor() -> Instant {
    *CLOCK_ANCHOR.get_or_init(Instant::now)
}

/// Monotonic instant in nanoseconds since a process-wide anchor.
///
/// [`Timestamp::ZERO`] is the reset value of a channel's last-edge time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The origin of the monotonic clock.
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from nanoseconds.
    #[must_use]
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Create a timestamp from microseconds.
    #[must_use]
    pub const fn from_micros(us: u64) -> Self {
        Self(us.saturating_mul(1_000))
    }

    /// Create a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    /// Read the monotonic clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Convert an `Instant` to a timestamp on the same clock as [`Timestamp::now`].
    ///
    /// Instants taken before the clock anchor map to [`Timestamp::ZERO`].
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        let elapsed = instant.saturating_duration_since(clock_anchor());
        Self(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Nanoseconds since the clock origin.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Whether this is the reset value.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Advance the timestamp by `duration`, saturating at the end of the clock.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ns))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Logic 0.
    #[default]
    Low,
    /// Logic 1.
    High,
}

impl Level {
    /// Parse a raw hardware read. Only 0 and 1 are valid.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Low),
            1 => Some(Self::High),
            _ => None,
        }
    }

    /// Whether the level is logic 1.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    /// The opposite level.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }

    /// Raw value as the hardware reports it.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_units() {
        assert_eq!(Timestamp::from_millis(3).as_nanos(), 3_000_000);
        assert_eq!(Timestamp::from_micros(7).as_nanos(), 7_000);
        assert!(Timestamp::ZERO.is_zero());
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = Timestamp::from_millis(5);
        let late = Timestamp::from_millis(12);
        assert_eq!(
            late.saturating_duration_since(early),
            Duration::from_millis(7)
        );
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_now_is_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
        assert_eq!(
            Timestamp::from_millis(1).saturating_add(Duration::from_micros(500)),
            Timestamp::from_micros(1_500)
        );
    }

    #[test]
    fn test_level_from_raw() {
        assert_eq!(Level::from_raw(0), Some(Level::Low));
        assert_eq!(Level::from_raw(1), Some(Level::High));
        assert_eq!(Level::from_raw(2), None);
        assert_eq!(Level::from_raw(-1), None);
        assert_eq!(Level::High.toggled(), Level::Low);
        assert_eq!(Level::from(true).as_raw(), 1);
    }
}
