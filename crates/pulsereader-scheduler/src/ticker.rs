//! Self-rearming periodic ticker.
//!
//! A dedicated thread calls the handler at absolute deadlines
//! `start + k * period`, so the schedule does not drift with handler run time.
//! When the handler overruns one or more deadlines the schedule is moved
//! forward past the current time and the skipped deadlines are counted as
//! overruns; missed ticks are never replayed in a burst.
//!
//! Waiting happens on a condition variable with a deadline, so `stop` can wake
//! the thread immediately. `stop` joins the thread before returning: once it
//! returns the handler will not run again.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::stats::{TickMetrics, TickStats};

/// Default name of the tick thread.
pub const DEFAULT_THREAD_NAME: &str = "pulse-tick";

/// Callback invoked on every tick with the time it fired.
pub type TickHandler = Box<dyn FnMut(Instant) + Send + 'static>;

struct Shared {
    stopping: Mutex<bool>,
    wake: Condvar,
    metrics: Mutex<TickMetrics>,
}

impl Shared {
    /// Sleep until `deadline`. Returns `false` if asked to stop first.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopping = self.stopping.lock();
        while !*stopping {
            if Instant::now() >= deadline {
                return true;
            }
            if self.wake.wait_until(&mut stopping, deadline).timed_out() {
                return !*stopping;
            }
        }
        false
    }
}

enum State {
    Running(JoinHandle<TickHandler>),
    Stopped(TickHandler),
    Dead,
}

/// Periodic tick source driving a handler from its own thread.
///
/// # Example
///
/// ```rust
/// use pulsereader_scheduler::PeriodicTicker;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::time::Duration;
///
/// let ticks = Arc::new(AtomicU64::new(0));
/// let counter = ticks.clone();
/// let mut ticker = PeriodicTicker::start(Duration::from_millis(1), move |_| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// })?;
///
/// std::thread::sleep(Duration::from_millis(20));
/// ticker.stop()?;
/// let seen = ticks.load(Ordering::Relaxed);
/// std::thread::sleep(Duration::from_millis(5));
/// assert_eq!(ticks.load(Ordering::Relaxed), seen);
/// # Ok::<(), pulsereader_scheduler::SchedulerError>(())
/// ```
pub struct PeriodicTicker {
    name: String,
    period: Duration,
    shared: Arc<Shared>,
    state: State,
}

impl PeriodicTicker {
    /// Start ticking every `period` on a thread named [`DEFAULT_THREAD_NAME`].
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidPeriod`] if `period` is zero.
    /// - [`SchedulerError::SpawnFailed`] if the thread cannot be spawned.
    pub fn start<F>(period: Duration, handler: F) -> SchedulerResult<Self>
    where
        F: FnMut(Instant) + Send + 'static,
    {
        Self::start_named(DEFAULT_THREAD_NAME, period, handler)
    }

    /// Start ticking every `period` on a thread named `name`.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidPeriod`] if `period` is zero.
    /// - [`SchedulerError::SpawnFailed`] if the thread cannot be spawned.
    pub fn start_named<F>(
        name: impl Into<String>,
        period: Duration,
        handler: F,
    ) -> SchedulerResult<Self>
    where
        F: FnMut(Instant) + Send + 'static,
    {
        validate_period(period)?;
        let mut ticker = Self {
            name: name.into(),
            period,
            shared: Arc::new(Shared {
                stopping: Mutex::new(false),
                wake: Condvar::new(),
                metrics: Mutex::new(TickMetrics::new()),
            }),
            state: State::Stopped(Box::new(handler)),
        };
        ticker.resume()?;
        Ok(ticker)
    }

    /// Name of the tick thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the tick thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Timing statistics accumulated since the ticker was created.
    #[must_use]
    pub fn stats(&self) -> TickStats {
        self.shared.metrics.lock().snapshot()
    }

    /// Cancel and restart ticking at a new period.
    ///
    /// The running thread is stopped and joined first, so no tick at the old
    /// period can fire after this returns. The first tick at the new period is
    /// one full period from now. A stopped ticker is started.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidPeriod`] if `period` is zero; the ticker keeps
    ///   its current period and state.
    /// - [`SchedulerError::ThreadPanicked`] if the handler had panicked.
    /// - [`SchedulerError::SpawnFailed`] if the new thread cannot be spawned.
    pub fn set_period(&mut self, period: Duration) -> SchedulerResult<()> {
        validate_period(period)?;
        self.stop()?;
        self.period = period;
        self.resume()
    }

    /// Restart a stopped ticker at its current period. No-op if running.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ThreadPanicked`] if the handler had panicked.
    /// - [`SchedulerError::SpawnFailed`] if the thread cannot be spawned.
    pub fn resume(&mut self) -> SchedulerResult<()> {
        let handler = match std::mem::replace(&mut self.state, State::Dead) {
            State::Stopped(handler) => handler,
            running @ State::Running(_) => {
                self.state = running;
                return Ok(());
            }
            State::Dead => return Err(SchedulerError::ThreadPanicked),
        };

        *self.shared.stopping.lock() = false;
        let shared = self.shared.clone();
        let period = self.period;
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(period, &shared, handler))?;

        debug!(thread = %self.name, period_ms = period.as_millis(), "Ticker started");
        self.state = State::Running(thread);
        Ok(())
    }

    /// Stop ticking and wait for the tick thread to exit.
    ///
    /// Idempotent. After this returns the handler will not be called again
    /// until [`resume`](Self::resume) or [`set_period`](Self::set_period).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ThreadPanicked`] if the handler panicked.
    pub fn stop(&mut self) -> SchedulerResult<()> {
        let thread = match std::mem::replace(&mut self.state, State::Dead) {
            State::Running(thread) => thread,
            State::Stopped(handler) => {
                self.state = State::Stopped(handler);
                return Ok(());
            }
            State::Dead => return Err(SchedulerError::ThreadPanicked),
        };

        *self.shared.stopping.lock() = true;
        self.shared.wake.notify_all();

        match thread.join() {
            Ok(handler) => {
                self.state = State::Stopped(handler);
                debug!(thread = %self.name, "Ticker stopped");
                Ok(())
            }
            Err(_) => Err(SchedulerError::ThreadPanicked),
        }
    }
}

impl Drop for PeriodicTicker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(thread = %self.name, error = %e, "Ticker did not stop cleanly");
        }
    }
}

impl fmt::Debug for PeriodicTicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTicker")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn validate_period(period: Duration) -> SchedulerResult<()> {
    if period.is_zero() {
        return Err(SchedulerError::invalid_period(period));
    }
    Ok(())
}

/// Tick loop. Hands the handler back when stopped so it can be restarted.
fn run(period: Duration, shared: &Shared, mut handler: TickHandler) -> TickHandler {
    let mut deadline = Instant::now() + period;

    while shared.wait_until(deadline) {
        let fired = Instant::now();
        handler(fired);

        let lateness = fired.saturating_duration_since(deadline);
        shared.metrics.lock().record_tick(lateness);
        trace!(lateness_ns = lateness.as_nanos(), "Tick");

        deadline += period;
        let now = Instant::now();
        if deadline <= now {
            let (next, skipped) = forward_past(deadline, now, period);
            deadline = next;
            shared.metrics.lock().record_overruns(skipped);
            warn!(skipped, period_ms = period.as_millis(), "Tick handler overran, deadlines skipped");
        }
    }

    handler
}

/// Move `deadline` forward by whole periods until it is after `now`.
///
/// Returns the new deadline and the number of periods skipped.
pub(crate) fn forward_past(deadline: Instant, now: Instant, period: Duration) -> (Instant, u64) {
    if deadline > now || period.is_zero() {
        return (deadline, 0);
    }
    let behind = now.saturating_duration_since(deadline).as_nanos();
    let skipped = u32::try_from(behind / period.as_nanos())
        .unwrap_or(u32::MAX)
        .saturating_add(1);
    let next = period
        .checked_mul(skipped)
        .and_then(|offset| deadline.checked_add(offset))
        .unwrap_or(now + period);
    (next, u64::from(skipped))
}
