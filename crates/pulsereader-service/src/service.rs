//! Real-time pulse reader.
//!
//! [`PulseReader`] owns a shared [`Engine`] and a [`PeriodicTicker`] that runs
//! the stall monitor at the engine's tick period. Edge sources call
//! [`PulseReader::on_edge`] from their own threads; readers poll
//! [`PulseReader::query`] or [`PulseReader::query_batch`].

use parking_lot::Mutex;
use pulsereader_core::{
    CounterSnapshot, EdgeOutcome, Engine, Estimate, IoStat, LineId, PulseResult, Timestamp,
};
use pulsereader_scheduler::{PeriodicTicker, TickStats};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::ServiceResult;

/// Point-in-time view of a running reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStatus {
    /// Current tick period in milliseconds.
    pub tick_period_ms: u64,
    /// Active lines in slot order.
    pub active_lines: Vec<LineId>,
    /// Engine counters.
    pub counters: CounterSnapshot,
    /// Tick thread timing.
    pub ticks: TickStats,
}

/// Engine plus the thread that ticks it.
pub struct PulseReader {
    engine: Arc<Engine>,
    ticker: Mutex<PeriodicTicker>,
}

impl PulseReader {
    /// Validate `config`, add its channels and start the tick thread.
    ///
    /// # Errors
    ///
    /// Returns any validation error, an engine error while adding a channel,
    /// or [`ServiceError::Scheduler`](crate::ServiceError::Scheduler) if the
    /// tick thread cannot be spawned.
    pub fn start(config: &ServiceConfig) -> ServiceResult<Self> {
        config.validate()?;

        let engine = Arc::new(Engine::new(config.engine));
        for channel in &config.channels {
            engine.add_channel(channel.line, config.window_for(channel))?;
        }

        let ticking = engine.clone();
        let ticker = PeriodicTicker::start(engine.tick_period(), move |now| {
            ticking.on_tick(Timestamp::from_instant(now));
        })?;

        info!(
            channels = engine.active_count(),
            tick_period_ms = engine.tick_period().as_millis(),
            estimator = ?engine.estimator(),
            "Pulse reader started"
        );
        Ok(Self {
            engine,
            ticker: Mutex::new(ticker),
        })
    }

    /// Shared engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Start measuring `line`. Idempotent for a line that is already active.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::CapacityExceeded`](pulsereader_core::PulseError::CapacityExceeded)
    /// if every slot is taken.
    pub fn add_channel(&self, line: LineId, filter_window: usize) -> ServiceResult<()> {
        self.engine.add_channel(line, filter_window)?;
        Ok(())
    }

    /// Stop measuring `line`.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::NotFound`](pulsereader_core::PulseError::NotFound)
    /// if the line is not active.
    pub fn remove_channel(&self, line: LineId) -> ServiceResult<()> {
        self.engine.remove_channel(line)?;
        Ok(())
    }

    /// Change the filter window of an active line and restart its measurement.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::NotFound`](pulsereader_core::PulseError::NotFound)
    /// if the line is not active.
    pub fn reconfigure_channel(&self, line: LineId, filter_window: usize) -> ServiceResult<()> {
        self.engine.reconfigure_channel(line, filter_window)?;
        Ok(())
    }

    /// Change the tick period, returning the clamped value.
    ///
    /// The tick thread is stopped before the engine resets its channels and
    /// restarted at the new period afterwards, so no tick at the old period
    /// can observe the reset state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Scheduler`](crate::ServiceError::Scheduler) if
    /// the tick thread cannot be stopped or restarted.
    pub fn set_period(&self, period_ms: u32) -> ServiceResult<Duration> {
        let mut ticker = self.ticker.lock();
        ticker.stop()?;
        let period = self.engine.set_period(period_ms);
        ticker.set_period(period)?;
        Ok(period)
    }

    /// Current tick period.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        self.engine.tick_period()
    }

    /// Record a transition on `line` happening now.
    ///
    /// # Errors
    ///
    /// See [`Engine::on_edge`].
    pub fn on_edge(&self, line: LineId, raw: i32) -> PulseResult<EdgeOutcome> {
        self.engine.on_edge(line, raw, Timestamp::now())
    }

    /// Record a transition on `line` at an explicit time.
    ///
    /// # Errors
    ///
    /// See [`Engine::on_edge`].
    pub fn on_edge_at(&self, line: LineId, raw: i32, now: Timestamp) -> PulseResult<EdgeOutcome> {
        self.engine.on_edge(line, raw, now)
    }

    /// Latest estimate for `line`, `None` if the line is not active.
    #[must_use]
    pub fn query(&self, line: LineId) -> Option<Estimate> {
        self.engine.query(line)
    }

    /// Answer a batch of requests, returning how many lines were active.
    pub fn query_batch(&self, requests: &mut [IoStat]) -> usize {
        self.engine.query_batch(requests)
    }

    /// Engine counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.engine.counters().snapshot()
    }

    /// Tick thread timing.
    #[must_use]
    pub fn tick_stats(&self) -> TickStats {
        self.ticker.lock().stats()
    }

    /// Whether the tick thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_running()
    }

    /// Snapshot of the reader.
    #[must_use]
    pub fn status(&self) -> ReaderStatus {
        ReaderStatus {
            tick_period_ms: u64::try_from(self.tick_period().as_millis()).unwrap_or(u64::MAX),
            active_lines: self.engine.active_lines(),
            counters: self.counters(),
            ticks: self.tick_stats(),
        }
    }

    /// Stop the tick thread. Estimates stay readable; edges are still
    /// accepted but nothing detects stalls any more.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Scheduler`](crate::ServiceError::Scheduler) if
    /// the tick handler had panicked.
    pub fn shutdown(&self) -> ServiceResult<()> {
        self.ticker.lock().stop()?;
        info!(counters = ?self.counters(), "Pulse reader stopped");
        Ok(())
    }
}

impl fmt::Debug for PulseReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulseReader")
            .field("engine", &self.engine)
            .field("ticker", &*self.ticker.lock())
            .finish()
    }
}
