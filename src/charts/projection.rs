//! Chart Projection Module
//! Turns the normalized tables into plain chart data: categories, series and
//! labels. Nothing here draws; see the renderer for that.

use crate::data::columns::{
    FATAL_ACCIDENTS, INJURED, KILLED, NON_FATAL_ACCIDENTS, REGION, TOTAL_ACCIDENTS,
    VEHICLES_INVOLVED, YEAR,
};
use crate::data::{numeric_values, text_values, ProcessorError};
use crate::stats::{group_mean, latest_year_subset, ordered_years, StatsError};
use plotters::style::RGBColor;
use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Column(#[from] ProcessorError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("No data to plot: {0}")]
    EmptyData(String),
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Cannot write to {path}: {source}")]
    Output {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub const BROWN: RGBColor = RGBColor(139, 69, 19);

/// The twelve charts of the analysis, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartId {
    NationalTrend,
    RegionalTrends,
    RegionAverage,
    NationalFatalVsNonFatal,
    RegionalFatalVsNonFatalLatest,
    NationalInjuredVsKilled,
    NationalVehicles,
    RegionalInjuredVsKilledLatest,
    RegionalVehicleTrends,
    AccidentShareLatest,
    KilledShareLatest,
    VehicleShareLatest,
}

impl ChartId {
    pub const ALL: [ChartId; 12] = [
        ChartId::NationalTrend,
        ChartId::RegionalTrends,
        ChartId::RegionAverage,
        ChartId::NationalFatalVsNonFatal,
        ChartId::RegionalFatalVsNonFatalLatest,
        ChartId::NationalInjuredVsKilled,
        ChartId::NationalVehicles,
        ChartId::RegionalInjuredVsKilledLatest,
        ChartId::RegionalVehicleTrends,
        ChartId::AccidentShareLatest,
        ChartId::KilledShareLatest,
        ChartId::VehicleShareLatest,
    ];

    /// 1-based position in the rendering sequence.
    pub fn number(self) -> usize {
        Self::ALL
            .iter()
            .position(|id| *id == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn slug(self) -> &'static str {
        match self {
            ChartId::NationalTrend => "national_trend",
            ChartId::RegionalTrends => "regional_trends",
            ChartId::RegionAverage => "region_average",
            ChartId::NationalFatalVsNonFatal => "national_fatal_vs_non_fatal",
            ChartId::RegionalFatalVsNonFatalLatest => "regional_fatal_vs_non_fatal_latest",
            ChartId::NationalInjuredVsKilled => "national_injured_vs_killed",
            ChartId::NationalVehicles => "national_vehicles",
            ChartId::RegionalInjuredVsKilledLatest => "regional_injured_vs_killed_latest",
            ChartId::RegionalVehicleTrends => "regional_vehicle_trends",
            ChartId::AccidentShareLatest => "accident_share_latest",
            ChartId::KilledShareLatest => "killed_share_latest",
            ChartId::VehicleShareLatest => "vehicle_share_latest",
        }
    }

    /// Output file name, e.g. `01_national_trend.png`.
    pub fn file_name(self) -> String {
        format!("{:02}_{}.png", self.number(), self.slug())
    }
}

/// A named sequence of values aligned with the chart's categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub color: Option<RGBColor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    /// One line per series over ordered categories (years)
    Line {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    /// Vertical bars, grouped side by side per category
    Bar {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    /// One horizontal bar per category, first category on top
    HorizontalBar {
        categories: Vec<String>,
        values: Vec<f64>,
    },
    /// Slices with their percentage share in the label
    Pie { labels: Vec<String>, values: Vec<f64> },
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub id: ChartId,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub size: (u32, u32),
    pub kind: ChartKind,
}

/// Project the tables into the data for chart `id`.
pub fn build_chart(
    id: ChartId,
    country: &DataFrame,
    region: &DataFrame,
) -> Result<ChartData, RenderError> {
    let chart = match id {
        ChartId::NationalTrend => {
            let (categories, mut series) = series_by_year(country, &[TOTAL_ACCIDENTS])?;
            series[0].name = "Pakistan".to_string();
            ChartData {
                id,
                title: "Annual Traffic Accidents in Pakistan".into(),
                x_label: "Year".into(),
                y_label: "Total Accidents".into(),
                size: (1000, 600),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::RegionalTrends => {
            let (categories, series) = series_by_year_and_group(region, REGION, TOTAL_ACCIDENTS)?;
            ChartData {
                id,
                title: "Annual Traffic Accidents by Region".into(),
                x_label: "Year".into(),
                y_label: "Total Accidents".into(),
                size: (1200, 700),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::RegionAverage => {
            let (categories, values): (Vec<String>, Vec<f64>) =
                group_mean(region, REGION, TOTAL_ACCIDENTS)?.into_iter().unzip();
            ChartData {
                id,
                title: "Average Annual Accidents per Region".into(),
                x_label: "Average Accidents".into(),
                y_label: "Region".into(),
                size: (1000, 600),
                kind: ChartKind::HorizontalBar { categories, values },
            }
        }
        ChartId::NationalFatalVsNonFatal => {
            let (categories, series) =
                series_by_year(country, &[FATAL_ACCIDENTS, NON_FATAL_ACCIDENTS])?;
            ChartData {
                id,
                title: "Fatal vs Non-Fatal Accidents in Pakistan".into(),
                x_label: "Year".into(),
                y_label: "Accidents".into(),
                size: (1000, 600),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::RegionalFatalVsNonFatalLatest => {
            let (year, latest) = latest_year_subset(region, YEAR)?;
            let (categories, series) =
                series_by_group(&latest, REGION, &[FATAL_ACCIDENTS, NON_FATAL_ACCIDENTS])?;
            ChartData {
                id,
                title: format!("Fatal vs Non-Fatal Accidents by Region ({year})"),
                x_label: "Region".into(),
                y_label: "Accidents".into(),
                size: (1200, 600),
                kind: ChartKind::Bar { categories, series },
            }
        }
        ChartId::NationalInjuredVsKilled => {
            let (categories, series) = series_by_year(country, &[INJURED, KILLED])?;
            ChartData {
                id,
                title: "People Injured vs Killed in Road Accidents (Pakistan)".into(),
                x_label: "Year".into(),
                y_label: "Number of People".into(),
                size: (1000, 600),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::NationalVehicles => {
            let (categories, mut series) = series_by_year(country, &[VEHICLES_INVOLVED])?;
            series[0].color = Some(BROWN);
            ChartData {
                id,
                title: "Vehicles Involved in Road Accidents (Pakistan)".into(),
                x_label: "Year".into(),
                y_label: "Vehicles Involved".into(),
                size: (1000, 600),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::RegionalInjuredVsKilledLatest => {
            let (year, latest) = latest_year_subset(region, YEAR)?;
            let (categories, series) = series_by_group(&latest, REGION, &[INJURED, KILLED])?;
            ChartData {
                id,
                title: format!("People Injured vs Killed in Road Accidents by Region ({year})"),
                x_label: "Region".into(),
                y_label: "Number of People".into(),
                size: (1200, 600),
                kind: ChartKind::Bar { categories, series },
            }
        }
        ChartId::RegionalVehicleTrends => {
            let (categories, series) =
                series_by_year_and_group(region, REGION, VEHICLES_INVOLVED)?;
            ChartData {
                id,
                title: "Vehicles Involved in Road Accidents by Region".into(),
                x_label: "Year".into(),
                y_label: "Vehicles Involved".into(),
                size: (1200, 700),
                kind: ChartKind::Line { categories, series },
            }
        }
        ChartId::AccidentShareLatest => share_chart(id, region, TOTAL_ACCIDENTS, "Accidents")?,
        ChartId::KilledShareLatest => share_chart(id, region, KILLED, "People Killed")?,
        ChartId::VehicleShareLatest => {
            share_chart(id, region, VEHICLES_INVOLVED, "Vehicles Involved")?
        }
    };

    check_not_empty(&chart)?;
    Ok(chart)
}

/// Pie of the latest year's rows, one slice per region.
fn share_chart(
    id: ChartId,
    region: &DataFrame,
    value_column: &str,
    what: &str,
) -> Result<ChartData, RenderError> {
    let (year, latest) = latest_year_subset(region, YEAR)?;
    let names = text_values(&latest, REGION)?;
    let values = numeric_values(&latest, value_column)?;

    let slices: Vec<(String, f64)> = names
        .into_iter()
        .zip(values)
        .filter_map(|(name, value)| Some((name?, value?)))
        .collect();

    if slices.iter().any(|(_, v)| *v < 0.0) {
        return Err(RenderError::EmptyData(format!(
            "negative {value_column} values cannot be shown as shares"
        )));
    }
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        return Err(RenderError::EmptyData(format!(
            "{value_column} sums to zero for {year}"
        )));
    }

    let (labels, values) = slices
        .into_iter()
        .map(|(name, value)| (format!("{name} ({:.1}%)", value / total * 100.0), value))
        .unzip();

    Ok(ChartData {
        id,
        title: format!("Share of {what} by Region ({year})"),
        x_label: String::new(),
        y_label: String::new(),
        size: (800, 800),
        kind: ChartKind::Pie { labels, values },
    })
}

/// One series per value column, averaged per year, years in chronological order.
fn series_by_year(
    df: &DataFrame,
    value_columns: &[&str],
) -> Result<(Vec<String>, Vec<Series>), RenderError> {
    let years = ordered_years(df, YEAR)?;
    let row_years = text_values(df, YEAR)?;

    let mut series = Vec::with_capacity(value_columns.len());
    for column in value_columns {
        let values = numeric_values(df, column)?;
        let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
        for (year, value) in row_years.iter().zip(values) {
            if let (Some(year), Some(value)) = (year, value) {
                let entry = acc.entry(year.as_str()).or_default();
                entry.0 += value;
                entry.1 += 1;
            }
        }
        series.push(Series {
            name: column.to_string(),
            values: years.iter().map(|y| mean_of(acc.get(y.as_str()))).collect(),
            color: None,
        });
    }
    Ok((years, series))
}

/// One series per distinct group (in first-seen order) of a single value column.
fn series_by_year_and_group(
    df: &DataFrame,
    group_column: &str,
    value_column: &str,
) -> Result<(Vec<String>, Vec<Series>), RenderError> {
    let years = ordered_years(df, YEAR)?;
    let row_years = text_values(df, YEAR)?;
    let groups = text_values(df, group_column)?;
    let values = numeric_values(df, value_column)?;

    let mut order: Vec<String> = Vec::new();
    let mut acc: HashMap<(String, String), (f64, usize)> = HashMap::new();
    for ((year, group), value) in row_years.into_iter().zip(groups).zip(values) {
        let (Some(year), Some(group)) = (year, group) else {
            continue;
        };
        if !order.contains(&group) {
            order.push(group.clone());
        }
        if let Some(value) = value {
            let entry = acc.entry((group, year)).or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let series = order
        .into_iter()
        .map(|group| {
            let values = years
                .iter()
                .map(|year| mean_of(acc.get(&(group.clone(), year.clone()))))
                .collect();
            Series {
                name: group,
                values,
                color: None,
            }
        })
        .collect();
    Ok((years, series))
}

/// Categories are the distinct group labels in first-seen order; one series per
/// value column holding the mean of each group's rows.
fn series_by_group(
    df: &DataFrame,
    group_column: &str,
    value_columns: &[&str],
) -> Result<(Vec<String>, Vec<Series>), RenderError> {
    let groups = text_values(df, group_column)?;
    let mut categories: Vec<String> = Vec::new();
    for group in groups.iter().flatten() {
        if !categories.contains(group) {
            categories.push(group.clone());
        }
    }

    let mut series = Vec::with_capacity(value_columns.len());
    for column in value_columns {
        let values = numeric_values(df, column)?;
        let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
        for (group, value) in groups.iter().zip(values) {
            if let (Some(group), Some(value)) = (group, value) {
                let entry = acc.entry(group.as_str()).or_default();
                entry.0 += value;
                entry.1 += 1;
            }
        }
        series.push(Series {
            name: column.to_string(),
            values: categories
                .iter()
                .map(|g| mean_of(acc.get(g.as_str())))
                .collect(),
            color: None,
        });
    }
    Ok((categories, series))
}

fn mean_of(acc: Option<&(f64, usize)>) -> Option<f64> {
    match acc {
        Some((sum, count)) if *count > 0 => Some(sum / *count as f64),
        _ => None,
    }
}

fn check_not_empty(chart: &ChartData) -> Result<(), RenderError> {
    let has_data = match &chart.kind {
        ChartKind::Line { series, .. } | ChartKind::Bar { series, .. } => series
            .iter()
            .any(|s| s.values.iter().any(|v| v.is_some())),
        ChartKind::HorizontalBar { values, .. } | ChartKind::Pie { values, .. } => {
            !values.is_empty()
        }
    };
    if has_data {
        Ok(())
    } else {
        Err(RenderError::EmptyData(chart.title.clone()))
    }
}
