//! Property-based tests for capture, carry and filtering invariants.

use pulsereader_core::filter::median;
use pulsereader_core::prelude::*;
use proptest::prelude::*;
use std::time::Duration;

fn micros(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_micros).collect()
}

/// Drive `pairs` of (high, low) widths in microseconds through a fresh channel.
fn feed_pairs(engine: &Engine, line: LineId, pairs: &[(u64, u64)]) -> Result<(), PulseError> {
    let mut t = 1_000u64;
    for (high, low) in pairs {
        engine.on_edge_level(line, Level::High, Timestamp::from_micros(t))?;
        t += high;
        engine.on_edge_level(line, Level::Low, Timestamp::from_micros(t))?;
        t += low;
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_median_is_a_buffered_sample(
        samples in prop::collection::vec(0..1_000_000u64, 1..=MAX_FILTER_WINDOW),
    ) {
        let samples = micros(&samples);
        let m = median(&samples);
        prop_assert!(samples.contains(&m));

        let below = samples.iter().filter(|s| **s < m).count();
        prop_assert!(below <= samples.len() / 2);
    }

    #[test]
    fn test_filtered_duty_is_a_recent_high_width(
        window in 1..=MAX_FILTER_WINDOW,
        extra in 0..10usize,
        widths in prop::collection::vec((1..20_000u64, 1..20_000u64), 58),
    ) {
        let engine = Engine::default();
        engine.add_channel(9, window)?;
        // the first rising edge only resumes the channel, so one extra pair
        // is needed before the low buffer holds a full window
        let pairs = widths.get(..window + 1 + extra).unwrap_or(&widths);
        feed_pairs(&engine, 9, pairs)?;

        let estimate = engine.try_query(9)?;
        prop_assert!(estimate.valid);

        let recent: Vec<u64> = pairs
            .iter()
            .rev()
            .take(window)
            .map(|(high, _)| high * 1_000)
            .collect();
        prop_assert!(recent.contains(&estimate.duty_ns));
        prop_assert!(estimate.period_ns >= estimate.duty_ns);
    }

    #[test]
    fn test_invalid_until_window_filled(
        window in 2..=MAX_FILTER_WINDOW,
        widths in prop::collection::vec((1..20_000u64, 1..20_000u64), 1..=MAX_FILTER_WINDOW),
    ) {
        let engine = Engine::default();
        engine.add_channel(9, window)?;
        let pairs = widths.get(..window.min(widths.len())).unwrap_or(&widths);
        feed_pairs(&engine, 9, pairs)?;
        prop_assert_eq!(engine.try_query(9)?, Estimate::INVALID);
    }

    #[test]
    fn test_duplicate_level_is_a_no_op(
        widths in prop::collection::vec((1..20_000u64, 1..20_000u64), 1..20),
        gap in 1..20_000u64,
    ) {
        let engine = Engine::default();
        engine.add_channel(9, 3)?;
        feed_pairs(&engine, 9, &widths)?;

        let before = engine.channel_status(9);
        let last = before.map_or(Timestamp::ZERO, |s| s.last_edge);
        let outcome = engine.on_edge_level(9, Level::Low, last.saturating_add(Duration::from_micros(gap)))?;
        prop_assert_eq!(outcome, EdgeOutcome::Duplicate);
        prop_assert_eq!(engine.channel_status(9), before);
    }

    #[test]
    fn test_carry_conserves_pulse_width(
        period_ms in 10..=50u32,
        rise_us in 1..10_000u64,
        width_us in 1..=30_000u64,
    ) {
        let engine = Engine::new(EngineConfig::default());
        engine.set_period(period_ms);
        engine.add_channel(9, 1)?;

        let period_us = u64::from(period_ms) * 1_000;
        let fall_us = rise_us + width_us;
        engine.on_edge_level(9, Level::High, Timestamp::from_micros(rise_us))?;

        let mut boundary = period_us;
        while boundary < fall_us {
            if boundary > rise_us {
                let summary = engine.on_tick(Timestamp::from_micros(boundary));
                prop_assert!(summary.stalled_lines().is_empty());
            }
            boundary += period_us;
        }

        let outcome = engine.on_edge_level(9, Level::Low, Timestamp::from_micros(fall_us))?;
        prop_assert_eq!(
            outcome,
            EdgeOutcome::Recorded { phase: Phase::High, width: Duration::from_micros(width_us) }
        );
    }

    #[test]
    fn test_tick_lock_order_does_not_change_widths(
        high_us in 1..9_000u64,
        low_us in 1..9_000u64,
        tick_us in 0..20_000u64,
        tick_after_fall in any::<bool>(),
    ) {
        let engine = Engine::default();
        engine.add_channel(9, 1)?;

        let rise = 1_000;
        let fall = rise + high_us;
        let rise_again = fall + low_us;
        let tick = Timestamp::from_micros(tick_us);

        engine.on_edge_level(9, Level::High, Timestamp::from_micros(rise))?;
        if !tick_after_fall {
            engine.on_tick(tick);
        }
        let closed_high = engine.on_edge_level(9, Level::Low, Timestamp::from_micros(fall))?;
        if tick_after_fall {
            engine.on_tick(tick);
        }
        let closed_low = engine.on_edge_level(9, Level::High, Timestamp::from_micros(rise_again))?;

        prop_assert_eq!(
            closed_high,
            EdgeOutcome::Recorded { phase: Phase::High, width: Duration::from_micros(high_us) }
        );
        prop_assert_eq!(
            closed_low,
            EdgeOutcome::Recorded { phase: Phase::Low, width: Duration::from_micros(low_us) }
        );
    }

    #[test]
    fn test_write_indices_stay_in_window(
        window in 1..=MAX_FILTER_WINDOW,
        levels in prop::collection::vec(prop_oneof![Just(0i32), Just(1i32), Just(2i32)], 1..200),
    ) {
        let engine = Engine::default();
        engine.add_channel(9, window)?;

        for (i, raw) in levels.iter().enumerate() {
            let now = Timestamp::from_micros(1_000 * (i as u64 + 1));
            match engine.on_edge(9, *raw, now) {
                Ok(_) | Err(PulseError::HardwareRead { .. }) => {}
                Err(e) => return Err(TestCaseError::fail(e.to_string())),
            }

            let status = engine.channel_status(9).ok_or_else(|| TestCaseError::fail("channel missing"))?;
            prop_assert!(status.write_index_high < window);
            prop_assert!(status.write_index_low < window);
            prop_assert!(status.high_filled <= window);
            prop_assert!(status.low_filled <= window);
        }
    }
}
