//! Concurrency tests: trigger, tick and query contexts racing on one engine.

use pulsereader_core::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const EDGES_PER_LINE: u64 = 500;

#[test]
fn test_edges_ticks_and_queries_race() -> TestResult {
    let engine = Arc::new(Engine::default());
    for line in 0..4 {
        engine.add_channel(line, 3)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let mut triggers = vec![];

    for line in 0..4 {
        let engine = engine.clone();
        triggers.push(thread::spawn(move || {
            let mut level = Level::Low;
            for _ in 0..EDGES_PER_LINE {
                level = level.toggled();
                if engine.on_edge_level(line, level, Timestamp::now()).is_err() {
                    return false;
                }
                thread::sleep(Duration::from_micros(20));
            }
            true
        }));
    }

    let ticker = {
        let engine = engine.clone();
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                engine.on_tick(Timestamp::now());
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let observed_bad = Arc::new(AtomicU64::new(0));
    let reader = {
        let engine = engine.clone();
        let running = running.clone();
        let observed_bad = observed_bad.clone();
        thread::spawn(move || {
            let mut batch: Vec<IoStat> = (0..4).map(IoStat::request).collect();
            while running.load(Ordering::Acquire) {
                engine.query_batch(&mut batch);
                for stat in &batch {
                    let consistent = if stat.valid {
                        stat.period_ns >= stat.duty_ns
                    } else {
                        stat.duty_ns == 0 && stat.period_ns == 0
                    };
                    if !consistent {
                        observed_bad.fetch_add(1, Ordering::Relaxed);
                    }
                }
                thread::sleep(Duration::from_micros(100));
            }
        })
    };

    for handle in triggers {
        assert_eq!(handle.join().ok(), Some(true), "Trigger thread failed");
    }
    running.store(false, Ordering::Release);
    assert!(ticker.join().is_ok(), "Tick thread should not panic");
    assert!(reader.join().is_ok(), "Query thread should not panic");

    let counters = engine.counters().snapshot();
    assert_eq!(counters.edges_recorded + counters.edges_duplicate, 4 * EDGES_PER_LINE);
    assert_eq!(counters.edges_duplicate, 0);
    assert_eq!(counters.edges_unknown_line, 0);
    assert!(counters.ticks > 0);
    assert_eq!(observed_bad.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn test_concurrent_add_remove_respects_capacity() {
    let engine = Arc::new(Engine::default());
    let mut handles = vec![];

    for line in 0..20 {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                match engine.add_channel(line, 3) {
                    Ok(_) => {
                        assert!(engine.active_count() <= MAX_CHANNELS);
                        assert_eq!(engine.remove_channel(line), Ok(()));
                    }
                    Err(e) => assert_eq!(e, PulseError::CapacityExceeded { capacity: MAX_CHANNELS }),
                }
            }
        }));
    }

    for handle in handles {
        assert!(handle.join().is_ok(), "Thread should not panic");
    }
    assert_eq!(engine.active_count(), 0);
}

#[test]
fn test_set_period_while_capturing() -> TestResult {
    let engine = Arc::new(Engine::default());
    engine.add_channel(1, 1)?;

    let trigger = {
        let engine = engine.clone();
        thread::spawn(move || {
            let mut level = Level::Low;
            for _ in 0..1_000 {
                level = level.toggled();
                if engine.on_edge_level(1, level, Timestamp::now()).is_err() {
                    return false;
                }
            }
            true
        })
    };

    let configurator = {
        let engine = engine.clone();
        thread::spawn(move || {
            for ms in [10, 20, 50, 100, 10] {
                engine.set_period(ms);
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    assert_eq!(trigger.join().ok(), Some(true), "Trigger thread failed");
    assert!(configurator.join().is_ok(), "Configuration thread should not panic");

    assert_eq!(engine.tick_period(), Duration::from_millis(10));
    let status = engine.channel_status(1).ok_or("channel missing")?;
    assert!(status.write_index_high < 1);
    assert!(status.write_index_low < 1);
    Ok(())
}
