//! Data Processor Module
//! Handles column-label normalization, year coercion and missing-value resolution.

use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Columns '{first}' and '{second}' both normalize to '{normalized}'")]
    ColumnCollision {
        first: String,
        second: String,
        normalized: String,
    },
    #[error("Required column '{column}' is missing (found: {available})")]
    MissingColumn { column: String, available: String },
    #[error("Column '{column}' must be numeric but contains '{value}'")]
    DataType { column: String, value: String },
    #[error("Missing values found: {0}")]
    MissingValues(String),
}

/// Strategy for cells that are empty in the source sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Take the nearest preceding value in the same column
    ForwardFill,
    /// Remove every row holding a missing cell
    DropRows,
    /// Fail if any cell is missing
    ErrorOnMissing,
}

impl Default for MissingValueStrategy {
    fn default() -> Self {
        MissingValueStrategy::ForwardFill
    }
}

/// Trim, lowercase and replace spaces with underscores.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Normalize every column label of `df`.
///
/// Two source labels that end up with the same normalized label are rejected
/// rather than silently merged.
pub fn normalize_columns(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut names = Vec::with_capacity(df.width());

    for original in df.get_column_names_str() {
        let normalized = normalize_label(original);
        if let Some(first) = seen.get(&normalized) {
            return Err(ProcessorError::ColumnCollision {
                first: first.clone(),
                second: original.to_string(),
                normalized,
            });
        }
        if normalized != original {
            debug!("Renaming column '{original}' -> '{normalized}'");
        }
        seen.insert(normalized.clone(), original.to_string());
        names.push(normalized);
    }

    let mut out = df.clone();
    out.set_column_names(names)?;
    Ok(out)
}

/// Turn the year column into text so it is charted as a discrete category.
pub fn coerce_year(df: &DataFrame, column: &str) -> Result<DataFrame, ProcessorError> {
    let year = require_column(df, column)?;

    let text = match year.dtype() {
        DataType::String => year.clone(),
        DataType::Float32 | DataType::Float64 => {
            let as_f64 = year.cast(&DataType::Float64)?;
            let values: Vec<Option<String>> = as_f64
                .f64()?
                .into_iter()
                .map(|v| {
                    v.map(|f| {
                        // 2019.0 -> "2019"
                        if f.fract() == 0.0 {
                            format!("{}", f as i64)
                        } else {
                            f.to_string()
                        }
                    })
                })
                .collect();
            Column::new(column.into(), values)
        }
        _ => year.cast(&DataType::String)?,
    };

    let mut out = df.clone();
    out.with_column(text)?;
    Ok(out)
}

/// Null count per column, in column order.
pub fn missing_counts(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count()))
        .collect()
}

/// Resolve missing cells according to `strategy`.
pub fn resolve_missing(
    df: &DataFrame,
    strategy: MissingValueStrategy,
) -> Result<DataFrame, ProcessorError> {
    match strategy {
        MissingValueStrategy::ForwardFill => {
            let filled = df.fill_null(FillNullStrategy::Forward(None))?;
            for (column, count) in missing_counts(&filled) {
                if count > 0 {
                    warn!(
                        "Column '{column}' keeps {count} leading missing value(s) with no prior value to fill from"
                    );
                }
            }
            Ok(filled)
        }
        MissingValueStrategy::DropRows => {
            let mut mask = BooleanChunked::full("mask".into(), true, df.height());
            for col in df.get_columns() {
                mask = &mask & &col.is_not_null();
            }
            let kept = df.filter(&mask)?;
            let dropped = df.height() - kept.height();
            if dropped > 0 {
                debug!("Dropped {dropped} row(s) with missing values");
            }
            Ok(kept)
        }
        MissingValueStrategy::ErrorOnMissing => {
            let missing: Vec<String> = missing_counts(df)
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(column, count)| format!("{column} ({count})"))
                .collect();
            if missing.is_empty() {
                Ok(df.clone())
            } else {
                Err(ProcessorError::MissingValues(missing.join(", ")))
            }
        }
    }
}

/// Check that the required columns exist and that numeric ones hold numbers.
///
/// Numeric columns stored as text (or holding no values at all) are parsed
/// into `Float64`; only a value that does not parse is a `DataType` error.
pub fn validate_schema(
    df: &DataFrame,
    text_columns: &[&str],
    numeric_columns: &[&str],
) -> Result<DataFrame, ProcessorError> {
    for name in text_columns {
        require_column(df, name)?;
    }

    let mut out = df.clone();
    for name in numeric_columns {
        let col = require_column(df, name)?;
        if is_numeric(col.dtype()) {
            continue;
        }
        let parsed = parse_numeric(name, col)?;
        debug!("Parsed column '{name}' ({}) as numbers", col.dtype());
        out.with_column(parsed)?;
    }
    Ok(out)
}

fn parse_numeric(name: &str, col: &Column) -> Result<Column, ProcessorError> {
    let as_text = col.cast(&DataType::String)?;
    let mut values: Vec<Option<f64>> = Vec::with_capacity(as_text.len());
    for value in as_text.str()?.into_iter() {
        let parsed = match value.map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<f64>().map_err(|_| ProcessorError::DataType {
                column: name.to_string(),
                value: text.to_string(),
            })?),
        };
        values.push(parsed);
    }
    Ok(Column::new(name.into(), values))
}

/// Values of a column rendered as text.
pub fn text_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>, ProcessorError> {
    let col = require_column(df, column)?;
    let as_text = col.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Values of a numeric column as `f64`.
pub fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>, ProcessorError> {
    let col = require_column(df, column)?;
    if !is_numeric(col.dtype()) {
        return Err(ProcessorError::DataType {
            column: column.to_string(),
            value: col.dtype().to_string(),
        });
    }
    let as_f64 = col.cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.into_iter().collect())
}

fn require_column<'a>(df: &'a DataFrame, column: &str) -> Result<&'a Column, ProcessorError> {
    df.column(column)
        .map_err(|_| ProcessorError::MissingColumn {
            column: column.to_string(),
            available: df.get_column_names_str().join(", "),
        })
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}
