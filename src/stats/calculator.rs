//! Statistics Calculator Module
//! Handles totals, grouped means, latest-year slicing and descriptive summaries.

use crate::data::{numeric_values, text_values, ProcessorError};
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error(transparent)]
    Column(#[from] ProcessorError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' has no years to choose from")]
    NoYears(String),
}

/// Descriptive statistics for a single numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl ColumnSummary {
    fn empty(column: &str) -> Self {
        Self {
            column: column.to_string(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Sum and mean of a numeric column. Missing cells are skipped, so the mean is
/// the sum over the number of present values (NaN when there are none).
pub fn total_and_mean(df: &DataFrame, column: &str) -> Result<(f64, f64), StatsError> {
    let values: Vec<f64> = numeric_values(df, column)?.into_iter().flatten().collect();
    let sum: f64 = values.iter().sum();
    let mean = if values.is_empty() {
        f64::NAN
    } else {
        sum / values.len() as f64
    };
    Ok((sum, mean))
}

/// Mean of `value_column` for every distinct `group_key`, highest first.
///
/// Groups tied on the mean keep the order in which they first appear.
pub fn group_mean(
    df: &DataFrame,
    group_key: &str,
    value_column: &str,
) -> Result<Vec<(String, f64)>, StatsError> {
    let keys = text_values(df, group_key)?;
    let values = numeric_values(df, value_column)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, f64, usize)> = Vec::new();

    for (key, value) in keys.into_iter().zip(values) {
        let Some(key) = key else { continue };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, 0.0, 0));
            groups.len() - 1
        });
        if let Some(v) = value {
            groups[slot].1 += v;
            groups[slot].2 += 1;
        }
    }

    let mut means: Vec<(String, f64)> = groups
        .into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(key, sum, count)| (key, sum / count as f64))
        .collect();

    // sort_by is stable, so first-seen order survives among equal means
    means.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(means)
}

/// Compare two year labels chronologically when both are integers, and
/// lexicographically otherwise.
pub fn compare_years(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Distinct years of a column in chronological order.
pub fn ordered_years(df: &DataFrame, year_column: &str) -> Result<Vec<String>, StatsError> {
    let mut years: Vec<String> = Vec::new();
    for year in text_values(df, year_column)?.into_iter().flatten() {
        if !years.contains(&year) {
            years.push(year);
        }
    }

    // Integer comparison only when every label is an integer, otherwise
    // mixing the two orders would not be transitive.
    if years.iter().all(|y| y.trim().parse::<i64>().is_ok()) {
        years.sort_by(|a, b| compare_years(a, b));
    } else {
        years.sort();
    }
    Ok(years)
}

/// Rows belonging to the most recent year, together with that year.
pub fn latest_year_subset(
    df: &DataFrame,
    year_column: &str,
) -> Result<(String, DataFrame), StatsError> {
    let latest = ordered_years(df, year_column)?
        .pop()
        .ok_or_else(|| StatsError::NoYears(year_column.to_string()))?;

    let rows = df
        .clone()
        .lazy()
        .filter(col(year_column).cast(DataType::String).eq(lit(latest.clone())))
        .collect()?;
    Ok((latest, rows))
}

/// Descriptive statistics for every numeric column of `df`.
pub fn describe(df: &DataFrame) -> Vec<ColumnSummary> {
    df.get_column_names_str()
        .into_iter()
        .filter_map(|name| {
            let values: Vec<f64> = numeric_values(df, name).ok()?.into_iter().flatten().collect();
            Some(compute_descriptive_stats(name, &values))
        })
        .collect()
}

/// Compute descriptive statistics for an array of values.
pub fn compute_descriptive_stats(column: &str, values: &[f64]) -> ColumnSummary {
    let n = values.len();
    if n == 0 {
        return ColumnSummary::empty(column);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    ColumnSummary {
        column: column.to_string(),
        count: n,
        mean: values.mean(),
        // Sample standard deviation; NaN for a single value
        std: values.std_dev(),
        min: sorted[0],
        p25: percentile(&sorted, 25.0),
        median: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        max: sorted[n - 1],
    }
}

/// Calculate percentile using linear interpolation (NumPy compatible).
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_values[0];
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    if lower == upper {
        sorted_values[lower]
    } else {
        sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::{REGION, TOTAL_ACCIDENTS, YEAR};

    fn country() -> DataFrame {
        df!(
            YEAR => ["2018", "2019", "2020"],
            TOTAL_ACCIDENTS => [100i64, 150, 200],
        )
        .unwrap()
    }

    #[test]
    fn test_total_and_mean() {
        let (sum, mean) = total_and_mean(&country(), TOTAL_ACCIDENTS).unwrap();
        assert_eq!(sum, 450.0);
        assert_eq!(mean, 150.0);
    }

    #[test]
    fn test_total_and_mean_ignores_row_order() {
        let reversed = country().reverse();
        assert_eq!(
            total_and_mean(&reversed, TOTAL_ACCIDENTS).unwrap(),
            total_and_mean(&country(), TOTAL_ACCIDENTS).unwrap()
        );
    }

    #[test]
    fn test_total_and_mean_skips_missing_values() {
        let df = df!(TOTAL_ACCIDENTS => [None, Some(10i64), Some(30)]).unwrap();
        let (sum, mean) = total_and_mean(&df, TOTAL_ACCIDENTS).unwrap();
        assert_eq!(sum, 40.0);
        assert_eq!(mean, 20.0);

        let empty = df!(TOTAL_ACCIDENTS => Vec::<i64>::new()).unwrap();
        let (sum, mean) = total_and_mean(&empty, TOTAL_ACCIDENTS).unwrap();
        assert_eq!(sum, 0.0);
        assert!(mean.is_nan());
    }

    #[test]
    fn test_total_and_mean_unknown_column() {
        let err = total_and_mean(&country(), "fatalities").unwrap_err();
        assert!(err.to_string().contains("fatalities"));
    }

    #[test]
    fn test_group_mean_sorted_descending() {
        let df = df!(
            REGION => ["A", "A", "B"],
            "x" => [10i64, 20, 30],
        )
        .unwrap();
        let means = group_mean(&df, REGION, "x").unwrap();
        assert_eq!(means, vec![("B".to_string(), 30.0), ("A".to_string(), 15.0)]);
    }

    #[test]
    fn test_group_mean_ties_keep_first_seen_order() {
        let df = df!(
            REGION => ["Sindh", "Punjab", "KP", "Sindh", "Punjab"],
            "x" => [5i64, 9, 1, 5, 9],
        )
        .unwrap();
        let means = group_mean(&df, REGION, "x").unwrap();
        let order: Vec<&str> = means.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(order, vec!["Punjab", "Sindh", "KP"]);

        let tied = df!(REGION => ["Z", "Y", "X"], "x" => [4i64, 4, 4]).unwrap();
        let order: Vec<String> = group_mean(&tied, REGION, "x")
            .unwrap()
            .into_iter()
            .map(|(g, _)| g)
            .collect();
        assert_eq!(order, vec!["Z", "Y", "X"]);
    }

    #[test]
    fn test_group_mean_is_non_increasing() {
        let df = df!(
            REGION => ["a", "b", "c", "a", "d", "b", "e"],
            "x" => [3.5f64, 7.0, 1.0, 9.0, 7.0, 0.5, 12.0],
        )
        .unwrap();
        let means = group_mean(&df, REGION, "x").unwrap();
        assert!(means.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_latest_year_subset() {
        let df = df!(
            YEAR => ["2019", "2020", "2018", "2020"],
            REGION => ["A", "B", "C", "D"],
        )
        .unwrap();
        let (latest, rows) = latest_year_subset(&df, YEAR).unwrap();
        assert_eq!(latest, "2020");
        assert_eq!(
            text_values(&rows, REGION).unwrap(),
            vec![Some("B".to_string()), Some("D".to_string())]
        );
    }

    #[test]
    fn test_latest_year_is_chronological_for_uneven_widths() {
        let df = df!(YEAR => ["999", "1000"]).unwrap();
        let (latest, rows) = latest_year_subset(&df, YEAR).unwrap();
        assert_eq!(latest, "1000");
        assert_eq!(rows.height(), 1);
    }

    #[test]
    fn test_latest_year_subset_without_years() {
        let df = df!(YEAR => [None::<&str>, None]).unwrap();
        assert!(matches!(
            latest_year_subset(&df, YEAR),
            Err(StatsError::NoYears(_))
        ));
    }

    #[test]
    fn test_ordered_years() {
        let df = df!(YEAR => ["2020", "2018", "2019", "2018"]).unwrap();
        assert_eq!(ordered_years(&df, YEAR).unwrap(), vec!["2018", "2019", "2020"]);
    }

    #[test]
    fn test_describe_numeric_columns_only() {
        let summaries = describe(&country());
        assert_eq!(summaries.len(), 1);

        let s = &summaries[0];
        assert_eq!(s.column, TOTAL_ACCIDENTS);
        assert_eq!(s.count, 3);
        assert_eq!(s.mean, 150.0);
        assert_eq!(s.std, 50.0);
        assert_eq!(s.min, 100.0);
        assert_eq!(s.p25, 125.0);
        assert_eq!(s.median, 150.0);
        assert_eq!(s.p75, 175.0);
        assert_eq!(s.max, 200.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 50.0), 2.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert_eq!(percentile(&[7.0], 25.0), 7.0);
    }
}
