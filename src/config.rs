//! Run configuration. Values come from defaults, then an optional TOML file,
//! then command-line flags.

use crate::data::MissingValueStrategy;
use crate::stats::ReconciliationMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("No input workbook given (use --input, ROADSTATS_INPUT or `input` in the config file)")]
    MissingInput,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub country_sheet: String,
    pub region_sheet: String,
    pub output_dir: PathBuf,
    pub missing_values: MissingValueStrategy,
    pub reconciliation: ReconciliationMode,
    pub open_charts: bool,
    pub summary_json: Option<PathBuf>,
    pub chart_width: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: None,
            country_sheet: "Country".into(),
            region_sheet: "By Region".into(),
            output_dir: "charts".into(),
            missing_values: MissingValueStrategy::default(),
            reconciliation: ReconciliationMode::default(),
            open_charts: false,
            summary_json: None,
            chart_width: None,
        }
    }
}

impl Config {
    /// Read a TOML config file; absent keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The workbook path, which has no default.
    pub fn input_path(&self) -> Result<&Path, ConfigError> {
        self.input.as_deref().ok_or(ConfigError::MissingInput)
    }
}
