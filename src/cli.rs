use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::data::MissingValueStrategy;
use crate::stats::ReconciliationMode;

/// Analyse annual traffic accident statistics and render charts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short = 'i',
        long,
        env = "ROADSTATS_INPUT",
        help = "Workbook (.xlsx/.xls/.ods) or directory of <sheet>.csv files"
    )]
    pub input: Option<PathBuf>,
    #[arg(short = 'o', long, help = "Directory the chart images are written to")]
    pub output_dir: Option<PathBuf>,
    #[arg(short = 'c', long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Name of the national sheet")]
    pub country_sheet: Option<String>,
    #[arg(long, help = "Name of the regional sheet")]
    pub region_sheet: Option<String>,
    #[arg(long, value_enum, help = "How to handle empty cells")]
    pub missing: Option<MissingValueStrategy>,
    #[arg(long, help = "Fail when region figures do not reconcile with the country figures")]
    pub strict: bool,
    #[arg(long, help = "Also write the summary statistics to this JSON file")]
    pub summary_json: Option<PathBuf>,
    #[arg(long, help = "Open each chart with the system image viewer")]
    pub open: bool,
    #[arg(long, help = "Chart width in pixels (height keeps the aspect ratio)")]
    pub width: Option<u32>,
}

impl Cli {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(input) = &self.input {
            config.input = Some(input.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(sheet) = &self.country_sheet {
            config.country_sheet = sheet.clone();
        }
        if let Some(sheet) = &self.region_sheet {
            config.region_sheet = sheet.clone();
        }
        if let Some(strategy) = self.missing {
            config.missing_values = strategy;
        }
        if self.strict {
            config.reconciliation = ReconciliationMode::Strict;
        }
        if let Some(path) = &self.summary_json {
            config.summary_json = Some(path.clone());
        }
        if self.open {
            config.open_charts = true;
        }
        if let Some(width) = self.width {
            config.chart_width = Some(width);
        }
        config
    }
}
