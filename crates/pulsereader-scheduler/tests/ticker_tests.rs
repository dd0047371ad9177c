//! Integration tests for the periodic ticker.
//!
//! Timing assertions are deliberately loose; CI machines are noisy.

use pulsereader_scheduler::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn counting_ticker(period: Duration) -> Result<(PeriodicTicker, Arc<AtomicU64>), SchedulerError> {
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = ticks.clone();
    let ticker = PeriodicTicker::start(period, move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;
    Ok((ticker, ticks))
}

#[test]
fn test_ticks_are_delivered() -> TestResult {
    let (mut ticker, ticks) = counting_ticker(Duration::from_millis(5))?;
    thread::sleep(Duration::from_millis(100));
    ticker.stop()?;

    let delivered = ticks.load(Ordering::Relaxed);
    assert!(delivered >= 5, "only {delivered} ticks in 100 ms");
    assert!(delivered <= 40, "{delivered} ticks in 100 ms at 5 ms");
    assert_eq!(ticker.stats().total_ticks, delivered);
    Ok(())
}

#[test]
fn test_no_tick_after_stop_returns() -> TestResult {
    let (mut ticker, ticks) = counting_ticker(Duration::from_millis(1))?;
    thread::sleep(Duration::from_millis(20));
    ticker.stop()?;

    let at_stop = ticks.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ticks.load(Ordering::Relaxed), at_stop);
    Ok(())
}

#[test]
fn test_stop_wakes_a_long_wait() -> TestResult {
    let (mut ticker, _ticks) = counting_ticker(Duration::from_secs(60))?;
    let started = Instant::now();
    ticker.stop()?;
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[test]
fn test_set_period_restarts_at_new_rate() -> TestResult {
    let (mut ticker, ticks) = counting_ticker(Duration::from_secs(60))?;
    ticker.set_period(Duration::from_millis(2))?;
    assert_eq!(ticker.period(), Duration::from_millis(2));
    assert!(ticker.is_running());

    thread::sleep(Duration::from_millis(50));
    ticker.stop()?;
    assert!(ticks.load(Ordering::Relaxed) > 0);
    Ok(())
}

#[test]
fn test_set_period_rejects_zero() -> TestResult {
    let (mut ticker, _ticks) = counting_ticker(Duration::from_millis(10))?;
    assert!(matches!(
        ticker.set_period(Duration::ZERO),
        Err(SchedulerError::InvalidPeriod(_))
    ));
    assert_eq!(ticker.period(), Duration::from_millis(10));
    assert!(ticker.is_running());
    Ok(())
}

#[test]
fn test_overrunning_handler_skips_deadlines() -> TestResult {
    let mut ticker = PeriodicTicker::start(Duration::from_millis(2), |_| {
        thread::sleep(Duration::from_millis(7));
    })?;
    thread::sleep(Duration::from_millis(60));
    ticker.stop()?;

    let stats = ticker.stats();
    assert!(stats.total_ticks > 0);
    assert!(stats.overruns >= stats.total_ticks.saturating_sub(1));
    Ok(())
}

#[test]
fn test_handler_sees_monotonic_times() -> TestResult {
    let last = Arc::new(parking_lot::Mutex::new(None::<Instant>));
    let violations = Arc::new(AtomicU64::new(0));
    let (seen, bad) = (last.clone(), violations.clone());

    let mut ticker = PeriodicTicker::start(Duration::from_millis(1), move |now| {
        let mut previous = seen.lock();
        if previous.is_some_and(|p| p >= now) {
            bad.fetch_add(1, Ordering::Relaxed);
        }
        *previous = Some(now);
    })?;
    thread::sleep(Duration::from_millis(30));
    ticker.stop()?;

    assert_eq!(violations.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn test_drop_stops_thread() -> TestResult {
    let (ticker, ticks) = counting_ticker(Duration::from_millis(1))?;
    thread::sleep(Duration::from_millis(10));
    drop(ticker);

    let at_drop = ticks.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ticks.load(Ordering::Relaxed), at_drop);
    Ok(())
}
