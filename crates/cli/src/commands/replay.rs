//! `pulsectl replay`: deterministic replay of a JSON-lines edge log

use anyhow::{Context, Result};
use pulsereader_core::LineId;
use pulsereader_service::{ReplaySession, ServiceError, read_records};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::commands::ReplayArgs;
use crate::output;

pub fn execute(args: &ReplayArgs, json: bool) -> Result<()> {
    let config = args.overrides.resolve()?;
    let mut session = ReplaySession::from_config(&config)?;

    // Without configured channels every line seen in the log is measured.
    if config.channels.is_empty() {
        for line in lines_in_log(&args.file)? {
            session.engine().add_channel_default(line)?;
        }
    }

    let records = session
        .replay_file(&args.file)
        .with_context(|| format!("replaying {}", args.file.display()))?;
    info!(records, file = %args.file.display(), "Replay complete");

    let summary = session.finish(args.until_ns);
    output::print_replay_summary(&summary, json)
}

/// Distinct lines of a log in order of first appearance.
fn lines_in_log(path: &Path) -> Result<Vec<LineId>> {
    let file = File::open(path).map_err(|e| ServiceError::io(path, e))?;
    let mut lines = Vec::new();
    for item in read_records(BufReader::new(file)) {
        let (_, record) = item?;
        if !lines.contains(&record.line) {
            lines.push(record.line);
        }
    }
    Ok(lines)
}
