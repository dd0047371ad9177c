//! Deterministic replay on a virtual clock.
//!
//! A [`ReplaySession`] owns an engine and feeds it an ordered stream of
//! [`EdgeRecord`]s. Before each record it injects a stall monitor tick at every
//! boundary `k * tick_period` up to and including the record's time, exactly as
//! a tick thread firing on schedule would have. A tick and an edge at the same
//! instant run tick first.
//!
//! Edge logs are JSON lines, one record per line:
//!
//! ```text
//! {"t_ns":0,"line":25,"level":1}
//! {"t_ns":10000000,"line":25,"level":0}
//! ```

use pulsereader_core::{
    CounterSnapshot, EdgeOutcome, Engine, EngineConfig, Estimate, LineId, PulseError, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};

/// One timestamped transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Virtual time in nanoseconds.
    pub t_ns: u64,
    /// Line the transition happened on.
    pub line: LineId,
    /// Raw level read back from the line (0 or 1; anything else is a bad read).
    pub level: i32,
}

impl EdgeRecord {
    /// Build a record.
    #[must_use]
    pub fn new(t_ns: u64, line: LineId, level: i32) -> Self {
        Self { t_ns, line, level }
    }

    /// Record time as an engine timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_nanos(self.t_ns)
    }

    /// Render as one JSON line (without the newline).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if serialization fails.
    pub fn to_json_line(&self) -> ServiceResult<String> {
        serde_json::to_string(self).map_err(|e| ServiceError::config(e.to_string()))
    }
}

/// Parse a JSON-lines edge log. Blank lines and lines starting with `#` are skipped.
///
/// Yields `(line_no, record)` pairs with 1-based line numbers.
pub fn read_records<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = ServiceResult<(usize, EdgeRecord)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line_no = index + 1;
            let text = match line {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(ServiceError::Parse {
                        line_no,
                        message: e.to_string(),
                    }));
                }
            };
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(
                serde_json::from_str::<EdgeRecord>(trimmed)
                    .map(|record| (line_no, record))
                    .map_err(|e| ServiceError::Parse {
                        line_no,
                        message: e.to_string(),
                    }),
            )
        })
}

/// Final state of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Records fed into the engine.
    pub records: usize,
    /// Ticks injected.
    pub ticks: u64,
    /// Virtual time reached, in nanoseconds.
    pub end_ns: u64,
    /// Estimate of every active channel, in slot order.
    pub estimates: Vec<ChannelEstimate>,
    /// Engine counters.
    pub counters: CounterSnapshot,
}

/// Estimate of one channel at the end of a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEstimate {
    /// Line.
    pub line: LineId,
    /// Estimate.
    #[serde(flatten)]
    pub estimate: Estimate,
}

/// Engine driven on a virtual clock.
#[derive(Debug)]
pub struct ReplaySession {
    engine: Engine,
    next_tick_ns: u64,
    now_ns: u64,
    records: usize,
    ticks: u64,
}

impl ReplaySession {
    /// Session over a fresh engine with no channels.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let engine = Engine::new(config);
        let first_tick = duration_ns(engine.tick_period());
        Self {
            engine,
            next_tick_ns: first_tick,
            now_ns: 0,
            records: 0,
            ticks: 0,
        }
    }

    /// Session with the configured channels already added.
    ///
    /// # Errors
    ///
    /// Returns any validation error, or [`ServiceError::Engine`] if a channel
    /// cannot be added.
    pub fn from_config(config: &ServiceConfig) -> ServiceResult<Self> {
        config.validate()?;
        let session = Self::new(config.engine);
        for channel in &config.channels {
            session
                .engine
                .add_channel(channel.line, config.window_for(channel))?;
        }
        Ok(session)
    }

    /// The engine being driven.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Current virtual time in nanoseconds.
    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Ticks injected so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Inject every tick due at or before `t_ns` and move the clock there.
    ///
    /// Times earlier than the current virtual time are ignored.
    pub fn advance_to(&mut self, t_ns: u64) {
        while self.next_tick_ns <= t_ns {
            self.engine.on_tick(Timestamp::from_nanos(self.next_tick_ns));
            self.ticks += 1;
            // the period is read back each tick so a mid-replay change applies
            let period = duration_ns(self.engine.tick_period()).max(1);
            self.next_tick_ns = self.next_tick_ns.saturating_add(period);
        }
        self.now_ns = self.now_ns.max(t_ns);
    }

    /// Change the tick period at the current virtual time.
    ///
    /// All channels are reset and the next tick is one new period from now.
    pub fn set_period(&mut self, period_ms: u32) -> Duration {
        let period = self.engine.set_period(period_ms);
        self.next_tick_ns = self.now_ns.saturating_add(duration_ns(period));
        period
    }

    /// Feed one record, numbering it by its position in the stream.
    ///
    /// Engine errors for the record (unknown line, bad level read) are counted
    /// by the engine and logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::OutOfOrder`] if the record is earlier than the
    /// current virtual time.
    pub fn feed(&mut self, record: EdgeRecord) -> ServiceResult<Option<EdgeOutcome>> {
        let position = self.records + 1;
        self.feed_numbered(position, record)
    }

    fn feed_numbered(
        &mut self,
        line_no: usize,
        record: EdgeRecord,
    ) -> ServiceResult<Option<EdgeOutcome>> {
        if record.t_ns < self.now_ns {
            return Err(ServiceError::OutOfOrder {
                line_no,
                t_ns: record.t_ns,
                previous_ns: self.now_ns,
            });
        }

        self.advance_to(record.t_ns);
        self.records += 1;

        match self
            .engine
            .on_edge(record.line, record.level, record.timestamp())
        {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e @ (PulseError::NotFound(_) | PulseError::HardwareRead { .. })) => {
                debug!(line_no, error = %e, "Edge record not applied");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Feed every record from an iterator.
    ///
    /// # Errors
    ///
    /// Stops at the first out-of-order record.
    pub fn feed_all<I>(&mut self, records: I) -> ServiceResult<usize>
    where
        I: IntoIterator<Item = EdgeRecord>,
    {
        let mut fed = 0;
        for record in records {
            self.feed(record)?;
            fed += 1;
        }
        Ok(fed)
    }

    /// Replay a JSON-lines edge log from a reader.
    ///
    /// # Errors
    ///
    /// Stops at the first malformed or out-of-order record.
    pub fn replay_reader<R: BufRead>(&mut self, reader: R) -> ServiceResult<usize> {
        let mut fed = 0;
        for item in read_records(reader) {
            let (line_no, record) = item?;
            self.feed_numbered(line_no, record)?;
            fed += 1;
        }
        Ok(fed)
    }

    /// Replay a JSON-lines edge log file.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] if the file cannot be opened, or any error
    /// from [`ReplaySession::replay_reader`].
    pub fn replay_file(&mut self, path: impl AsRef<Path>) -> ServiceResult<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ServiceError::io(path, e))?;
        let fed = self.replay_reader(std::io::BufReader::new(file))?;
        if fed == 0 {
            warn!(path = %path.display(), "Edge log contained no records");
        }
        Ok(fed)
    }

    /// Optionally run the clock on to `until_ns`, then report every channel.
    #[must_use]
    pub fn finish(&mut self, until_ns: Option<u64>) -> ReplaySummary {
        if let Some(until_ns) = until_ns {
            self.advance_to(until_ns);
        }

        let estimates = self
            .engine
            .active_lines()
            .into_iter()
            .filter_map(|line| {
                self.engine
                    .query(line)
                    .map(|estimate| ChannelEstimate { line, estimate })
            })
            .collect();

        ReplaySummary {
            records: self.records,
            ticks: self.ticks,
            end_ns: self.now_ns,
            estimates,
            counters: self.engine.counters().snapshot(),
        }
    }
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
