//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::Colorize;
use pulsereader_core::{CounterSnapshot, Estimate, IoStat, LineId};
use pulsereader_service::{ReaderStatus, ReplaySummary};
use serde_json::json;

use crate::commands::simulate::Poll;
use crate::error::CliError;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "exit_code": crate::error::exit_code(error),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(CliError::Json)?;
    println!("{text}");
    Ok(())
}

/// Nanoseconds as microseconds with one decimal.
fn format_us(ns: u64) -> String {
    format!("{}.{} us", ns / 1_000, ns % 1_000 / 100)
}

fn print_estimate(line: LineId, estimate: &Estimate) {
    if estimate.valid {
        println!(
            "  {} line {:>3}  duty {:>12}  period {:>12}",
            "●".green(),
            line,
            format_us(estimate.duty_ns),
            format_us(estimate.period_ns)
        );
    } else {
        println!(
            "  {} line {:>3}  {}",
            "○".red(),
            line,
            "no valid estimate".dimmed()
        );
    }
}

fn print_counters(counters: &CounterSnapshot) {
    println!(
        "{} edges {}, duplicates {}, unknown line {}, hardware errors {}, ticks {}, stalls {}, resumes {}",
        "Counters:".bold(),
        counters.edges_recorded,
        counters.edges_duplicate,
        counters.edges_unknown_line,
        counters.hardware_errors,
        counters.ticks,
        counters.stalls,
        counters.resumes
    );
}

/// Print one poll of a running simulation
pub fn print_poll(poll: &Poll) {
    println!("{}", format!("t = {} ms", poll.elapsed_ms).bold());
    for stat in &poll.stats {
        print_estimate(stat.line, &stat.estimate());
    }
}

/// Print the end of a simulation
pub fn print_simulation_summary(
    polls: &[Poll],
    last: &[IoStat],
    status: &ReaderStatus,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(&json!({
            "success": true,
            "polls": polls,
            "final": last,
            "status": status,
        }));
    }

    println!();
    println!(
        "{} {} polls, tick period {} ms",
        "Simulation finished:".bold(),
        polls.len(),
        status.tick_period_ms
    );
    for stat in last {
        print_estimate(stat.line, &stat.estimate());
    }
    print_counters(&status.counters);
    println!(
        "{} {} ticks, {} overruns, p99 lateness {}",
        "Ticker:".bold(),
        status.ticks.total_ticks,
        status.ticks.overruns,
        format_us(status.ticks.p99_lateness_ns)
    );
    Ok(())
}

/// Print the result of a replay
pub fn print_replay_summary(summary: &ReplaySummary, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "success": true,
            "replay": summary,
        }));
    }

    println!(
        "{} {} records, {} ticks, ended at {}",
        "Replay:".bold(),
        summary.records,
        summary.ticks,
        format_us(summary.end_ns)
    );
    if summary.estimates.is_empty() {
        println!("{}", "No channels measured".yellow());
    }
    for channel in &summary.estimates {
        print_estimate(channel.line, &channel.estimate);
    }
    print_counters(&summary.counters);
    Ok(())
}
