//! Cross-checks between accident counts that the source tables are expected,
//! but not guaranteed, to satisfy.

use super::calculator::{compare_years, StatsError};
use crate::data::columns::{FATAL_ACCIDENTS, METRICS, NON_FATAL_ACCIDENTS, TOTAL_ACCIDENTS, YEAR};
use crate::data::{numeric_values, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const TOLERANCE: f64 = 1e-6;

/// Whether consistency issues only warn or fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationMode {
    #[default]
    Advisory,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// fatal + non-fatal differs from the total on one row
    SeverityMismatch {
        table: String,
        row: usize,
        year: Option<String>,
        fatal: f64,
        non_fatal: f64,
        total: f64,
    },
    /// Regions of one year do not add up to the country figure
    RegionTotalMismatch {
        year: String,
        column: String,
        country: f64,
        regions: f64,
    },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::SeverityMismatch {
                table,
                row,
                year,
                fatal,
                non_fatal,
                total,
            } => write!(
                f,
                "{table} row {row} ({}): fatal {fatal} + non-fatal {non_fatal} != total {total}",
                year.as_deref().unwrap_or("unknown year")
            ),
            ConsistencyIssue::RegionTotalMismatch {
                year,
                column,
                country,
                regions,
            } => write!(
                f,
                "{year}: regions sum {column} to {regions}, country reports {country}"
            ),
        }
    }
}

/// Run every consistency check over the normalized tables.
pub fn check_consistency(
    country: &DataFrame,
    region: &DataFrame,
) -> Result<Vec<ConsistencyIssue>, StatsError> {
    let mut issues = severity_mismatches("country", country)?;
    issues.extend(severity_mismatches("region", region)?);
    issues.extend(region_total_mismatches(country, region)?);
    Ok(issues)
}

/// Rows where fatal and non-fatal accidents do not add up to the total.
pub fn severity_mismatches(
    table: &str,
    df: &DataFrame,
) -> Result<Vec<ConsistencyIssue>, StatsError> {
    let years = text_values(df, YEAR)?;
    let fatal = numeric_values(df, FATAL_ACCIDENTS)?;
    let non_fatal = numeric_values(df, NON_FATAL_ACCIDENTS)?;
    let total = numeric_values(df, TOTAL_ACCIDENTS)?;

    let mut issues = Vec::new();
    for (row, year) in years.into_iter().enumerate() {
        let (Some(f), Some(n), Some(t)) = (fatal[row], non_fatal[row], total[row]) else {
            continue;
        };
        if (f + n - t).abs() > TOLERANCE {
            issues.push(ConsistencyIssue::SeverityMismatch {
                table: table.to_string(),
                row,
                year,
                fatal: f,
                non_fatal: n,
                total: t,
            });
        }
    }
    Ok(issues)
}

/// Years where the region rows do not sum to the country row, per metric.
///
/// Only years present in both tables are compared.
pub fn region_total_mismatches(
    country: &DataFrame,
    region: &DataFrame,
) -> Result<Vec<ConsistencyIssue>, StatsError> {
    let country_years = text_values(country, YEAR)?;
    let region_years = text_values(region, YEAR)?;
    let mut issues = Vec::new();

    for column in METRICS {
        let country_values = numeric_values(country, column)?;
        let region_values = numeric_values(region, column)?;

        let mut country_by_year: BTreeMap<String, f64> = BTreeMap::new();
        for (year, value) in country_years.iter().zip(&country_values) {
            if let (Some(year), Some(value)) = (year, value) {
                *country_by_year.entry(year.clone()).or_default() += value;
            }
        }

        let mut region_by_year: BTreeMap<String, f64> = BTreeMap::new();
        for (year, value) in region_years.iter().zip(&region_values) {
            if let (Some(year), Some(value)) = (year, value) {
                *region_by_year.entry(year.clone()).or_default() += value;
            }
        }

        let mut years: Vec<&String> = country_by_year
            .keys()
            .filter(|y| region_by_year.contains_key(*y))
            .collect();
        years.sort_by(|a, b| compare_years(a, b));

        for year in years {
            let country_total = country_by_year[year];
            let region_total = region_by_year[year];
            if (country_total - region_total).abs() > TOLERANCE {
                issues.push(ConsistencyIssue::RegionTotalMismatch {
                    year: year.clone(),
                    column: column.to_string(),
                    country: country_total,
                    regions: region_total,
                });
            }
        }
    }
    Ok(issues)
}
