//! `pulsectl generate`: write a synthetic JSON-lines edge log

use anyhow::Result;
use pulsereader_service::merge_until;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;
use tracing::info;

use crate::commands::GenerateArgs;
use crate::error::CliError;

pub fn execute(args: &GenerateArgs) -> Result<()> {
    let jitter = Duration::from_micros(args.jitter_us);
    let mut sources = Vec::with_capacity(args.channels.len());
    for (index, channel) in args.channels.iter().enumerate() {
        let mut source = channel.source()?.with_jitter(jitter);
        if let Some(seed) = args.seed {
            source = source.with_seed(seed.wrapping_add(u64::try_from(index).unwrap_or(0)));
        }
        sources.push(source);
    }

    let until_ns = args.duration_ms.saturating_mul(1_000_000);
    let records = merge_until(sources, until_ns);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(CliError::Io)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for record in &records {
        writeln!(out, "{}", record.to_json_line()?).map_err(CliError::Io)?;
    }
    out.flush().map_err(CliError::Io)?;

    info!(records = records.len(), until_ns, "Edge log written");
    Ok(())
}
