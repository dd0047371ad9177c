//! Synthetic PWM edge source.
//!
//! Produces the edges of an ideal PWM waveform with optional per-phase
//! jitter. The jitter generator is seeded, so a source always yields the same
//! sequence for the same parameters.

use pulsereader_core::{Level, LineId};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::replay::EdgeRecord;

const DEFAULT_SEED: u64 = 0x5eed_0f_9a15e;

/// Infinite iterator over the edges of a PWM waveform on one line.
///
/// # Example
///
/// ```rust
/// use pulsereader_service::sim::PwmSource;
/// use std::time::Duration;
///
/// let source = PwmSource::new(25, Duration::from_millis(3), Duration::from_millis(10))?;
/// let times: Vec<u64> = source.take(4).map(|edge| edge.t_ns / 1_000_000).collect();
/// assert_eq!(times, vec![0, 3, 10, 13]);
/// # Ok::<(), pulsereader_service::ServiceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PwmSource {
    line: LineId,
    duty: Duration,
    period: Duration,
    jitter: Duration,
    next_ns: u64,
    next_level: Level,
    rng: fastrand::Rng,
}

impl PwmSource {
    /// Waveform with the given high width and cycle, starting with a rising
    /// edge at time zero.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidSource`] unless `0 < duty < period`.
    pub fn new(line: LineId, duty: Duration, period: Duration) -> ServiceResult<Self> {
        if duty.is_zero() {
            return Err(ServiceError::invalid_source(line, "duty must be non-zero"));
        }
        if duty >= period {
            return Err(ServiceError::invalid_source(
                line,
                format!("duty {duty:?} must be shorter than period {period:?}"),
            ));
        }
        Ok(Self {
            line,
            duty,
            period,
            jitter: Duration::ZERO,
            next_ns: 0,
            next_level: Level::High,
            rng: fastrand::Rng::with_seed(DEFAULT_SEED),
        })
    }

    /// Perturb every phase width by up to `jitter` either way.
    ///
    /// Widths never drop below 1 ns.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Seed the jitter generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Time of the first edge.
    #[must_use]
    pub fn starting_at(mut self, t_ns: u64) -> Self {
        self.next_ns = t_ns;
        self
    }

    /// Level the line moves to on the first edge.
    #[must_use]
    pub fn first_level(mut self, level: Level) -> Self {
        self.next_level = level;
        self
    }

    /// Line the source drives.
    #[must_use]
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Nominal high width.
    #[must_use]
    pub fn duty(&self) -> Duration {
        self.duty
    }

    /// Nominal cycle width.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time of the next edge.
    #[must_use]
    pub fn next_edge_ns(&self) -> u64 {
        self.next_ns
    }

    fn phase_width(&mut self, level: Level) -> u64 {
        let nominal = match level {
            Level::High => self.duty,
            Level::Low => self.period.saturating_sub(self.duty),
        };
        let nominal = i64::try_from(nominal.as_nanos()).unwrap_or(i64::MAX);
        let jitter = i64::try_from(self.jitter.as_nanos()).unwrap_or(0);
        let offset = if jitter > 0 {
            self.rng.i64(-jitter..=jitter)
        } else {
            0
        };
        u64::try_from(nominal.saturating_add(offset).max(1)).unwrap_or(1)
    }
}

impl Iterator for PwmSource {
    type Item = EdgeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let level = self.next_level;
        let edge = EdgeRecord::new(self.next_ns, self.line, level.as_raw());
        let width = self.phase_width(level);
        self.next_ns = self.next_ns.saturating_add(width);
        self.next_level = level.toggled();
        Some(edge)
    }
}

/// Merge several sources into one time-ordered stream ending before `until_ns`.
///
/// Ties are broken by source order.
#[must_use]
pub fn merge_until(mut sources: Vec<PwmSource>, until_ns: u64) -> Vec<EdgeRecord> {
    let mut merged = Vec::new();
    loop {
        let earliest = sources
            .iter_mut()
            .filter(|source| source.next_edge_ns() < until_ns)
            .min_by_key(|source| source.next_edge_ns());
        match earliest.and_then(|source| source.next()) {
            Some(edge) => merged.push(edge),
            None => return merged,
        }
    }
}
