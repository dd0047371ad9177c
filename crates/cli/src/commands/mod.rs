//! Command implementations for pulsectl

pub mod config;
pub mod generate;
pub mod replay;
pub mod simulate;

use clap::{Args, ValueEnum};
use pulsereader_core::{Estimator, LineId};
use pulsereader_service::{PwmSource, ServiceConfig, ServiceResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// A synthetic channel given on the command line as `LINE:DUTY_US:PERIOD_US`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub line: LineId,
    pub duty_us: u64,
    pub period_us: u64,
}

impl ChannelSpec {
    pub fn source(&self) -> ServiceResult<PwmSource> {
        PwmSource::new(
            self.line,
            Duration::from_micros(self.duty_us),
            Duration::from_micros(self.period_us),
        )
    }
}

impl FromStr for ChannelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(':');
        let (Some(line), Some(duty), Some(period), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected LINE:DUTY_US:PERIOD_US, got '{s}'"));
        };

        let line = line
            .trim()
            .parse::<LineId>()
            .map_err(|e| format!("invalid line '{line}': {e}"))?;
        let duty_us = duty
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid duty '{duty}': {e}"))?;
        let period_us = period
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid period '{period}': {e}"))?;

        if duty_us == 0 || duty_us >= period_us {
            return Err(format!(
                "duty must be non-zero and shorter than the period, got {duty_us}us of {period_us}us"
            ));
        }
        Ok(Self {
            line,
            duty_us,
            period_us,
        })
    }
}

/// Aggregation strategy as a command-line value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EstimatorArg {
    /// Medians computed at query time
    OnDemand,
    /// Medians published on every tick
    Periodic,
}

impl From<EstimatorArg> for Estimator {
    fn from(arg: EstimatorArg) -> Self {
        match arg {
            EstimatorArg::OnDemand => Self::OnDemand,
            EstimatorArg::Periodic => Self::Periodic,
        }
    }
}

/// Engine settings shared by `simulate` and `replay`.
#[derive(Debug, Clone, Default, Args)]
pub struct EngineOverrides {
    /// Service configuration file (.yaml, .yml or .json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Median filter window for channels without their own
    #[arg(long, value_name = "N")]
    pub window: Option<usize>,

    /// Stall monitor tick period in milliseconds
    #[arg(long, value_name = "P")]
    pub period_ms: Option<u32>,

    /// Aggregation strategy
    #[arg(long, value_enum)]
    pub estimator: Option<EstimatorArg>,
}

impl EngineOverrides {
    /// Load the configuration file (or the defaults) and apply the overrides.
    pub fn resolve(&self) -> ServiceResult<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(window) = self.window {
            config.engine.default_filter_window = window;
        }
        if let Some(period_ms) = self.period_ms {
            config.engine.tick_period_ms = period_ms;
        }
        if let Some(estimator) = self.estimator {
            config.engine.estimator = estimator.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub overrides: EngineOverrides,

    /// Synthetic channel as LINE:DUTY_US:PERIOD_US (repeatable)
    #[arg(long = "channel", value_name = "LINE:DUTY_US:PERIOD_US")]
    pub channels: Vec<ChannelSpec>,

    /// How long to run, in seconds
    #[arg(long, default_value_t = 2.0)]
    pub seconds: f64,

    /// Interval between estimate polls, in milliseconds
    #[arg(long, default_value_t = 250)]
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// JSON-lines edge log
    pub file: PathBuf,

    #[command(flatten)]
    pub overrides: EngineOverrides,

    /// Keep ticking until this virtual time (nanoseconds) after the last record
    #[arg(long, value_name = "T")]
    pub until_ns: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Synthetic channel as LINE:DUTY_US:PERIOD_US (repeatable)
    #[arg(long = "channel", value_name = "LINE:DUTY_US:PERIOD_US", required = true)]
    pub channels: Vec<ChannelSpec>,

    /// Length of the log in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub duration_ms: u64,

    /// Maximum per-phase jitter in microseconds
    #[arg(long, default_value_t = 0)]
    pub jitter_us: u64,

    /// Jitter generator seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Configuration output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Print this configuration file, validated, instead of the defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
