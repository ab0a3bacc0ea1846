//! Roadstats - Traffic Accident Statistics Analysis
//!
//! Reads the national and regional accident sheets of a workbook, cleans them,
//! prints summary statistics and renders the chart set as PNG files.

mod charts;
mod cli;
mod config;
mod data;
mod pipeline;
mod report;
mod stats;

use anyhow::{bail, Result};
use clap::Parser;
use cli::Cli;
use config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL);
    }
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    debug!("args: {args:?}");

    let base = match &args.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };
    let config = args.apply(base);
    debug!("config: {config:?}");

    let report = pipeline::run(&config)?;
    if !report.is_complete() {
        bail!(
            "{} of {} charts failed to render",
            report.failed.len(),
            report.failed.len() + report.rendered.len()
        );
    }
    Ok(())
}
