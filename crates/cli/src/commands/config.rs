//! `pulsectl config`: print the service configuration

use anyhow::Result;
use pulsereader_service::ServiceConfig;

use crate::commands::{ConfigArgs, OutputFormat};

pub fn execute(args: &ConfigArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    let text = match args.format {
        OutputFormat::Yaml => config.to_yaml()?,
        OutputFormat::Json => config.to_json()?,
    };
    println!("{}", text.trim_end());
    Ok(())
}
