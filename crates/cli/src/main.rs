//! pulsectl - Pulse reader control CLI
//!
//! Drives the pulse capture engine from the command line: synthetic channels
//! in real time, deterministic replay of recorded edge logs, and
//! configuration inspection.

#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{ConfigArgs, GenerateArgs, ReplayArgs, SimulateArgs};

#[derive(Parser)]
#[command(name = "pulsectl")]
#[command(about = "Pulse reader control CLI - simulate, replay and inspect duty/period capture")]
#[command(version)]
#[command(long_about = "
pulsectl exercises the pulse reader engine, which measures the duty cycle and
period of up to ten pulse-train inputs.

`simulate` runs synthetic PWM channels against the real-time service,
`replay` feeds a recorded JSON-lines edge log through the engine on a virtual
clock, `generate` writes such a log, and `config` prints the configuration.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(long, global = true, help = "Output in JSON format for machine parsing")]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run synthetic channels against the real-time service
    Simulate(SimulateArgs),

    /// Replay a JSON-lines edge log on a virtual clock
    Replay(ReplayArgs),

    /// Write a synthetic JSON-lines edge log
    Generate(GenerateArgs),

    /// Print the service configuration
    Config(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "pulsectl={log_level},pulsereader_core={log_level},pulsereader_service={log_level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Simulate(args) => commands::simulate::execute(args, cli.json),
        Commands::Replay(args) => commands::replay::execute(args, cli.json),
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::Config(args) => commands::config::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ChannelSpec, OutputFormat};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_global_flags() -> TestResult {
        let cli = Cli::try_parse_from(["pulsectl", "--json", "-vv", "config"])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Config(_)));
        Ok(())
    }

    #[test]
    fn parse_simulate_channels() -> TestResult {
        let cli = Cli::try_parse_from([
            "pulsectl",
            "simulate",
            "--channel",
            "25:1500:20000",
            "--channel",
            "26:500:4000",
            "--window",
            "5",
            "--seconds",
            "1",
        ])?;
        let Commands::Simulate(args) = cli.command else {
            return Err("expected simulate".into());
        };
        assert_eq!(
            args.channels,
            vec![
                ChannelSpec {
                    line: 25,
                    duty_us: 1_500,
                    period_us: 20_000
                },
                ChannelSpec {
                    line: 26,
                    duty_us: 500,
                    period_us: 4_000
                },
            ]
        );
        assert_eq!(args.overrides.window, Some(5));
        assert!((args.seconds - 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn parse_replay_options() -> TestResult {
        let cli = Cli::try_parse_from([
            "pulsectl",
            "replay",
            "edges.jsonl",
            "--period-ms",
            "20",
            "--until-ns",
            "500000000",
        ])?;
        let Commands::Replay(args) = cli.command else {
            return Err("expected replay".into());
        };
        assert_eq!(args.file.to_str(), Some("edges.jsonl"));
        assert_eq!(args.overrides.period_ms, Some(20));
        assert_eq!(args.until_ns, Some(500_000_000));
        Ok(())
    }

    #[test]
    fn parse_config_format() -> TestResult {
        let cli = Cli::try_parse_from(["pulsectl", "config", "--format", "json"])?;
        let Commands::Config(args) = cli.command else {
            return Err("expected config".into());
        };
        assert_eq!(args.format, OutputFormat::Json);
        Ok(())
    }

    #[test]
    fn malformed_channel_rejected() {
        for value in ["25", "25:10", "x:1:2", "25:0:100", "25:100:100"] {
            let result = Cli::try_parse_from(["pulsectl", "simulate", "--channel", value]);
            assert!(matches!(result, Err(_)), "{value} should be rejected");
        }
    }
}
