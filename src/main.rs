mod bridge;
mod config;
mod error;
mod extractor;
mod geocoder;
mod hasher;
mod ledger;
mod metadata;
mod processor;
mod source;
mod sources;
mod walker;

use crate::bridge::AdbBridge;
use crate::config::AppConfig;
use crate::geocoder::{LocationResolver, NominatimGeocoder};
use crate::processor::Processor;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Pulls photos and videos from the phone (or a staging folder) into place/month folders.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory holding default.toml and optional overrides
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Maximum number of files handled in this run
    #[arg(long)]
    max_files: Option<usize>,

    /// Do not probe for a device; read from the staging directory
    #[arg(long)]
    local_only: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::new(&cli.config_dir)
        .with_context(|| format!("loading configuration from {:?}", cli.config_dir))?;
    if let Some(max_files) = cli.max_files {
        config.max_files_per_run = max_files;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    config.validate().context("invalid configuration")?;
    info!("Starting photo ingestion");

    let bridge = AdbBridge::new(config.bridge_program.clone(), config.bridge_timeout());
    let geocoder = NominatimGeocoder::new(&config)?;
    let resolver = LocationResolver::new(Box::new(geocoder), config.city_component_from_end);

    let summary = Processor::new(&config, &bridge, &resolver, cli.local_only)
        .run()
        .context("ingestion run aborted")?;

    if summary.quarantined > 0 {
        log::warn!(
            "{} malformed ledger entries were kept aside in {:?}",
            summary.quarantined,
            config.duplicates_file
        );
    }
    info!(
        "Photo ingestion finished ({} accepted from {}).",
        summary.accepted,
        summary
            .origin
            .map(|o| o.to_string())
            .unwrap_or_else(|| "no origin".into())
    );
    Ok(())
}
