//! `pulsectl simulate`: synthetic channels against the real-time service

use anyhow::Result;
use pulsereader_core::IoStat;
use pulsereader_service::{ChannelConfig, PulseReader, PwmSource};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::commands::{ChannelSpec, SimulateArgs};
use crate::error::CliError;
use crate::output;

/// Longest single sleep of an edge thread, so it notices the stop flag promptly.
const MAX_EDGE_SLEEP: Duration = Duration::from_millis(20);

/// One round of batched queries.
#[derive(Debug, Clone, Serialize)]
pub struct Poll {
    pub elapsed_ms: u64,
    pub stats: Vec<IoStat>,
}

pub fn execute(args: &SimulateArgs, json: bool) -> Result<()> {
    if args.channels.is_empty() {
        return Err(CliError::InvalidArgument("at least one --channel is required".into()).into());
    }
    let run_for = Duration::try_from_secs_f64(args.seconds)
        .map_err(|e| CliError::InvalidArgument(format!("invalid --seconds: {e}")))?;
    let poll_every = Duration::from_millis(args.poll_ms.max(1));

    let mut config = args.overrides.resolve()?;
    for (index, requested) in args.channels.iter().enumerate() {
        if args.channels.iter().take(index).any(|earlier| earlier.line == requested.line) {
            return Err(CliError::InvalidArgument(format!(
                "line {} given more than once",
                requested.line
            ))
            .into());
        }
        if !config.channels.iter().any(|channel| channel.line == requested.line) {
            config.channels.push(ChannelConfig::new(requested.line));
        }
    }
    let sources = args
        .channels
        .iter()
        .map(ChannelSpec::source)
        .collect::<Result<Vec<_>, _>>()?;

    let reader = PulseReader::start(&config)?;
    let mut requests: Vec<IoStat> = config
        .channels
        .iter()
        .map(|channel| IoStat::request(channel.line))
        .collect();

    info!(
        channels = sources.len(),
        seconds = args.seconds,
        poll_ms = args.poll_ms,
        "Simulation started"
    );

    let stop = AtomicBool::new(false);
    let polls = thread::scope(|scope| {
        for source in sources {
            let reader = &reader;
            let stop = &stop;
            scope.spawn(move || drive(reader, source, stop));
        }

        let polls = poll_loop(&reader, &mut requests, poll_every, run_for, json);
        stop.store(true, Ordering::Release);
        polls
    });

    reader.shutdown()?;
    output::print_simulation_summary(&polls, &requests, &reader.status(), json)
}

/// Replay `source` in wall-clock time until `stop` is set.
fn drive(reader: &PulseReader, source: PwmSource, stop: &AtomicBool) {
    let origin = Instant::now();
    let line = source.line();

    for edge in source {
        let at = origin + Duration::from_nanos(edge.t_ns);
        loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            let remaining = at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(MAX_EDGE_SLEEP));
        }

        if let Err(e) = reader.on_edge(edge.line, edge.level) {
            warn!(line, error = %e, "Synthetic edge rejected");
        }
    }
}

fn poll_loop(
    reader: &PulseReader,
    requests: &mut [IoStat],
    poll_every: Duration,
    run_for: Duration,
    json: bool,
) -> Vec<Poll> {
    let started = Instant::now();
    let mut polls = Vec::new();

    loop {
        let elapsed = started.elapsed();
        if elapsed >= run_for {
            break;
        }
        thread::sleep(poll_every.min(run_for.saturating_sub(elapsed)));

        reader.query_batch(requests);
        let poll = Poll {
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            stats: requests.to_vec(),
        };
        if !json {
            output::print_poll(&poll);
        }
        polls.push(poll);
    }

    polls
}
