//! Console and JSON reporting of the analysis results.

use comfy_table::{presets::NOTHING, *};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;

use crate::charts::RenderReport;
use crate::stats::{ColumnSummary, ConsistencyIssue};

/// Figures computed for one run, printed to the console and optionally saved as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub country_rows: usize,
    pub region_rows: usize,
    pub country_missing: Vec<(String, usize)>,
    pub region_missing: Vec<(String, usize)>,
    pub country_describe: Vec<ColumnSummary>,
    pub region_describe: Vec<ColumnSummary>,
    pub total_accidents: f64,
    pub mean_annual_accidents: f64,
    pub region_means: Vec<RegionMean>,
    pub latest_year: String,
    pub consistency_issues: Vec<ConsistencyIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionMean {
    pub region: String,
    pub mean_accidents: f64,
}

/// Round to an integer and group digits with commas, e.g. `1234567.4` -> `1,234,567`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn styled_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .set_style(TableComponent::BottomBorder, '─')
        .set_style(TableComponent::MiddleHeaderIntersections, '─')
        .set_style(TableComponent::HeaderLines, '─')
        .set_style(TableComponent::BottomBorderIntersections, '─')
        .set_style(TableComponent::TopBorder, '─')
        .set_style(TableComponent::TopBorderIntersections, '─');
    table
}

fn stat_cell(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{value:.2}")
    }
}

/// Describe-style table: one row per numeric column.
pub fn describe_table(summaries: &[ColumnSummary]) -> Table {
    let mut table = styled_table(vec![
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max",
    ]);
    for s in summaries {
        table.add_row(vec![
            s.column.clone(),
            s.count.to_string(),
            stat_cell(s.mean),
            stat_cell(s.std),
            stat_cell(s.min),
            stat_cell(s.p25),
            stat_cell(s.median),
            stat_cell(s.p75),
            stat_cell(s.max),
        ]);
    }
    table
}

fn missing_table(counts: &[(String, usize)]) -> Table {
    let mut table = styled_table(vec!["column", "missing"]);
    for (column, count) in counts {
        table.add_row(vec![column.clone(), count.to_string()]);
    }
    table
}

/// Shape line followed by the first rows of a table as read from the source.
fn head_section(title: &str, df: &DataFrame) -> String {
    let (rows, columns) = df.shape();
    format!(
        "\n--- {title} (as read: {rows} rows x {columns} columns) ---\n{}",
        df.head(Some(5))
    )
}

/// Print the shape and first rows of both sheets before cleaning.
pub fn display_heads(country: &DataFrame, region: &DataFrame) {
    println!("{}", head_section("Country-level Data", country));
    println!("{}", head_section("Region-level Data", region));
}

pub fn display_summary(summary: &AnalysisSummary) {
    println!("\nMissing values in Country data:\n{}", missing_table(&summary.country_missing));
    println!("\nMissing values in Region data:\n{}", missing_table(&summary.region_missing));

    println!(
        "\nSummary - Country level ({} rows):\n{}",
        summary.country_rows,
        describe_table(&summary.country_describe)
    );
    println!(
        "\nSummary - Region level ({} rows):\n{}",
        summary.region_rows,
        describe_table(&summary.region_describe)
    );

    println!(
        "\nTotal accidents in Pakistan (all years): {}",
        format_thousands(summary.total_accidents)
    );
    println!(
        "Average annual accidents in Pakistan: {}",
        format_thousands(summary.mean_annual_accidents)
    );

    let mut table = styled_table(vec!["region", "average accidents"]);
    for rm in &summary.region_means {
        table.add_row(vec![rm.region.clone(), format_thousands(rm.mean_accidents)]);
    }
    println!("\nAverage annual accidents per region:\n{table}");
    println!("Latest year in region data: {}", summary.latest_year);

    if !summary.consistency_issues.is_empty() {
        println!(
            "\n{} consistency issue(s):",
            summary.consistency_issues.len()
        );
        for issue in &summary.consistency_issues {
            println!("  - {issue}");
        }
    }
}

pub fn display_render_report(report: &RenderReport) {
    let mut table = styled_table(vec!["#", "chart", "result"]);
    for (id, path) in &report.rendered {
        table.add_row(vec![
            format!("{:02}", id.number()),
            id.slug().to_string(),
            path.display().to_string(),
        ]);
    }
    for (id, reason) in &report.failed {
        table.add_row(vec![
            format!("{:02}", id.number()),
            id.slug().to_string(),
            format!("FAILED: {reason}"),
        ]);
    }
    println!("\nCharts:\n{table}");
}

/// Write the summary as pretty-printed JSON.
pub fn write_summary_json(summary: &AnalysisSummary, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(1000.0), "1,000");
        assert_eq!(format_thousands(1234567.4), "1,234,567");
        assert_eq!(format_thousands(-45210.6), "-45,211");
        assert_eq!(format_thousands(f64::NAN), "NaN");
    }

    #[test]
    fn test_describe_table_lists_columns() {
        let df = polars::prelude::df!("killed" => [1.0f64, 2.0, 3.0]).unwrap();
        let summaries = crate::stats::describe(&df);
        let rendered = describe_table(&summaries).to_string();
        assert!(rendered.contains("killed"));
        assert!(rendered.contains("2.00"));
    }

    #[test]
    fn test_head_section_reports_source_shape() {
        let df = polars::prelude::df!(
            "Year" => [2018i64, 2019, 2020, 2021, 2022, 2023],
            "Killed" => [1i64, 2, 3, 4, 5, 6],
        )
        .unwrap();
        let section = head_section("Country-level Data", &df);
        assert!(
            section.contains("Country-level Data (as read: 6 rows x 2 columns)"),
            "{section}"
        );
        assert!(section.contains("Year"));
        assert!(!section.contains("2023"), "Only the first five rows are shown");
    }

    #[test]
    fn test_write_summary_json() {
        let summary = AnalysisSummary {
            country_rows: 3,
            region_rows: 0,
            country_missing: vec![("killed".into(), 1)],
            region_missing: vec![],
            country_describe: vec![],
            region_describe: vec![],
            total_accidents: 450.0,
            mean_annual_accidents: 150.0,
            region_means: vec![RegionMean {
                region: "Punjab".into(),
                mean_accidents: 110.0,
            }],
            latest_year: "2020".into(),
            consistency_issues: vec![],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_summary_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_accidents"], 450.0);
        assert_eq!(value["region_means"][0]["region"], "Punjab");
        assert_eq!(value["latest_year"], "2020");
    }
}
