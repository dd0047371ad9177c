//! Engine configuration and clamping rules.
//!
//! Out-of-range filter windows and tick periods handed to the engine at run time
//! are clamped into range and reported with `tracing::warn!`, never rejected.
//! [`EngineConfig::validate`] is the strict check used for configuration files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PulseError, PulseResult};

/// Number of channel slots in the table.
pub const MAX_CHANNELS: usize = 10;

/// Largest median filter window.
pub const MAX_FILTER_WINDOW: usize = 48;

/// Smallest median filter window.
pub const MIN_FILTER_WINDOW: usize = 1;

/// Filter window used when none is configured.
pub const DEFAULT_FILTER_WINDOW: usize = 3;

/// Shortest tick period in milliseconds.
pub const MIN_TICK_PERIOD_MS: u32 = 10;

/// Longest tick period in milliseconds.
pub const MAX_TICK_PERIOD_MS: u32 = 1000;

/// Tick period used when none is configured.
pub const DEFAULT_TICK_PERIOD_MS: u32 = 10;

/// Longest plausible pulse. A carry above this declares the channel stalled.
///
/// Must exceed the period of every monitored signal.
pub const MAX_PULSE_WIDTH: Duration = Duration::from_millis(30);

/// How queries turn the phase buffers into an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Medians of the high and low widths computed independently at query time;
    /// period is the sum of the two medians.
    #[default]
    OnDemand,
    /// Median of the high widths and median of per-slot `high + low` sums,
    /// recomputed on every tick and published for queries.
    Periodic,
}

/// Clamp a filter window into `[MIN_FILTER_WINDOW, MAX_FILTER_WINDOW]`.
#[must_use]
pub fn clamp_filter_window(window: usize) -> usize {
    let clamped = window.clamp(MIN_FILTER_WINDOW, MAX_FILTER_WINDOW);
    if clamped != window {
        tracing::warn!(
            requested = window,
            clamped,
            "Filter window out of range, clamped"
        );
    }
    clamped
}

/// Clamp a tick period into `[MIN_TICK_PERIOD_MS, MAX_TICK_PERIOD_MS]`.
#[must_use]
pub fn clamp_tick_period_ms(ms: u32) -> u32 {
    let clamped = ms.clamp(MIN_TICK_PERIOD_MS, MAX_TICK_PERIOD_MS);
    if clamped != ms {
        tracing::warn!(requested_ms = ms, clamped_ms = clamped, "Tick period out of range, clamped");
    }
    clamped
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stall monitor period in milliseconds.
    pub tick_period_ms: u32,
    /// Window used for channels added without an explicit one.
    pub default_filter_window: usize,
    /// Estimator answering queries.
    pub estimator: Estimator,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            default_filter_window: DEFAULT_FILTER_WINDOW,
            estimator: Estimator::OnDemand,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::InvalidConfig`] if the tick period or the default
    /// filter window is out of range.
    pub fn validate(&self) -> PulseResult<()> {
        if !(MIN_TICK_PERIOD_MS..=MAX_TICK_PERIOD_MS).contains(&self.tick_period_ms) {
            return Err(PulseError::invalid_config(format!(
                "tick_period_ms must be between {MIN_TICK_PERIOD_MS} and {MAX_TICK_PERIOD_MS}, got {}",
                self.tick_period_ms
            )));
        }
        if !(MIN_FILTER_WINDOW..=MAX_FILTER_WINDOW).contains(&self.default_filter_window) {
            return Err(PulseError::invalid_config(format!(
                "default_filter_window must be between {MIN_FILTER_WINDOW} and {MAX_FILTER_WINDOW}, got {}",
                self.default_filter_window
            )));
        }
        Ok(())
    }

    /// Copy of the configuration with every value clamped into range.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            tick_period_ms: clamp_tick_period_ms(self.tick_period_ms),
            default_filter_window: clamp_filter_window(self.default_filter_window),
            estimator: self.estimator,
        }
    }

    /// Tick period as a `Duration`.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_period_ms))
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for `EngineConfig`.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the tick period in milliseconds.
    #[must_use]
    pub fn tick_period_ms(mut self, ms: u32) -> Self {
        self.config.tick_period_ms = ms;
        self
    }

    /// Set the default filter window.
    #[must_use]
    pub fn default_filter_window(mut self, window: usize) -> Self {
        self.config.default_filter_window = window;
        self
    }

    /// Set the estimator.
    #[must_use]
    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.config.estimator = estimator;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> PulseResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
