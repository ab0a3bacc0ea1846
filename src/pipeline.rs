//! The analysis run: load, clean, aggregate, report, render.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use polars::prelude::DataFrame;

use crate::charts::{RenderReport, StaticChartRenderer};
use crate::config::Config;
use crate::data::columns::{COUNTRY_TEXT, METRICS, REGION, REGION_TEXT, TOTAL_ACCIDENTS, YEAR};
use crate::data::{
    coerce_year, load_tables, missing_counts, normalize_columns, resolve_missing,
    validate_schema, MissingValueStrategy, ProcessorError, RawTables,
};
use crate::report::{self, AnalysisSummary, RegionMean};
use crate::stats::{
    check_consistency, describe, group_mean, latest_year_subset, total_and_mean,
    ReconciliationMode,
};

/// Source tables, cleaned tables and the figures derived from them.
#[derive(Debug)]
pub struct Analysis {
    pub raw: RawTables,
    pub country: DataFrame,
    pub region: DataFrame,
    pub summary: AnalysisSummary,
}

/// A cleaned table along with its missing-value counts before resolution.
struct CleanTable {
    df: DataFrame,
    missing: Vec<(String, usize)>,
}

fn clean_table(
    raw: &DataFrame,
    text_columns: &[&str],
    strategy: MissingValueStrategy,
) -> Result<CleanTable, ProcessorError> {
    let df = normalize_columns(raw)?;
    let df = validate_schema(&df, text_columns, &METRICS)?;
    let df = coerce_year(&df, YEAR)?;
    let missing = missing_counts(&df);
    let df = resolve_missing(&df, strategy)?;
    Ok(CleanTable { df, missing })
}

/// Load, clean and aggregate, without producing any output.
pub fn analyze(config: &Config) -> Result<Analysis> {
    let input = config.input_path()?;

    let raw = load_tables(input, &config.country_sheet, &config.region_sheet)
        .with_context(|| format!("Loading stage failed for {}", input.display()))?;

    let country = clean_table(&raw.country, &COUNTRY_TEXT, config.missing_values)
        .with_context(|| format!("Cleaning stage failed for sheet '{}'", config.country_sheet))?;
    let region = clean_table(&raw.region, &REGION_TEXT, config.missing_values)
        .with_context(|| format!("Cleaning stage failed for sheet '{}'", config.region_sheet))?;
    info!(
        "Cleaned tables: country {:?}, region {:?}",
        country.df.shape(),
        region.df.shape()
    );

    let summary = aggregate(&country, &region).context("Aggregation stage failed")?;

    for issue in &summary.consistency_issues {
        warn!("Consistency: {issue}");
    }
    if config.reconciliation == ReconciliationMode::Strict
        && !summary.consistency_issues.is_empty()
    {
        bail!(
            "{} consistency issue(s) found in strict reconciliation mode",
            summary.consistency_issues.len()
        );
    }

    Ok(Analysis {
        raw,
        country: country.df,
        region: region.df,
        summary,
    })
}

fn aggregate(country: &CleanTable, region: &CleanTable) -> Result<AnalysisSummary> {
    let (total_accidents, mean_annual_accidents) = total_and_mean(&country.df, TOTAL_ACCIDENTS)?;
    let region_means = group_mean(&region.df, REGION, TOTAL_ACCIDENTS)?
        .into_iter()
        .map(|(region, mean_accidents)| RegionMean {
            region,
            mean_accidents,
        })
        .collect();
    let (latest_year, _) = latest_year_subset(&region.df, YEAR)?;
    let consistency_issues = check_consistency(&country.df, &region.df)?;

    Ok(AnalysisSummary {
        country_rows: country.df.height(),
        region_rows: region.df.height(),
        country_missing: country.missing.clone(),
        region_missing: region.missing.clone(),
        country_describe: describe(&country.df),
        region_describe: describe(&region.df),
        total_accidents,
        mean_annual_accidents,
        region_means,
        latest_year,
        consistency_issues,
    })
}

/// Full run: analysis, console report, optional JSON summary and the charts.
pub fn run(config: &Config) -> Result<RenderReport> {
    let analysis = analyze(config)?;

    report::display_heads(&analysis.raw.country, &analysis.raw.region);
    report::display_summary(&analysis.summary);

    if let Some(path) = &config.summary_json {
        report::write_summary_json(&analysis.summary, path)
            .with_context(|| format!("Cannot write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    let renderer = StaticChartRenderer::new(&config.output_dir, config.chart_width);
    let render_report = renderer
        .render_all(&analysis.country, &analysis.region)
        .context("Rendering stage failed")?;
    report::display_render_report(&render_report);
    info!(
        "{} chart(s) written to {}",
        render_report.rendered.len(),
        renderer.output_dir().display()
    );

    if config.open_charts {
        for (_, path) in &render_report.rendered {
            if let Err(e) = open::that(path) {
                warn!("Could not open {}: {e}", path.display());
            }
        }
    }

    Ok(render_report)
}
