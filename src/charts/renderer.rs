//! Static Chart Renderer
//! Draws chart data to PNG files with plotters.
//!
//! Every chart is rendered on its own: a chart whose data cannot be projected
//! or drawn is recorded as failed and the remaining charts still run.

use super::projection::{build_chart, ChartData, ChartId, ChartKind, RenderError, Series};
use crate::report::format_thousands;
use log::{error, info};
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::ops::Range;
use std::path::{Path, PathBuf};

// Line / bar series colors
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),  // Blue
    RGBColor(255, 127, 14),  // Orange
    RGBColor(44, 160, 44),   // Green
    RGBColor(214, 39, 40),   // Red
    RGBColor(148, 103, 189), // Purple
    RGBColor(140, 86, 75),   // Brown
    RGBColor(227, 119, 194), // Pink
    RGBColor(127, 127, 127), // Grey
    RGBColor(188, 189, 34),  // Olive
    RGBColor(23, 190, 207),  // Cyan
];

// Horizontal bar gradient, dark to light
const VIRIDIS: [RGBColor; 8] = [
    RGBColor(68, 1, 84),
    RGBColor(70, 50, 126),
    RGBColor(54, 92, 141),
    RGBColor(39, 127, 142),
    RGBColor(31, 161, 135),
    RGBColor(74, 193, 109),
    RGBColor(160, 218, 57),
    RGBColor(253, 231, 37),
];

const FONT: &str = "sans-serif";

/// Outcome of rendering the full chart sequence.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: Vec<(ChartId, PathBuf)>,
    pub failed: Vec<(ChartId, String)>,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct StaticChartRenderer {
    output_dir: PathBuf,
    width: Option<u32>,
}

impl StaticChartRenderer {
    /// `width` overrides each chart's default width, keeping its aspect ratio.
    pub fn new(output_dir: impl Into<PathBuf>, width: Option<u32>) -> Self {
        Self {
            output_dir: output_dir.into(),
            width,
        }
    }

    /// Project and draw all twelve charts.
    pub fn render_all(
        &self,
        country: &DataFrame,
        region: &DataFrame,
    ) -> Result<RenderReport, RenderError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::Output {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut report = RenderReport::default();
        for id in ChartId::ALL {
            let outcome =
                build_chart(id, country, region).and_then(|chart| self.render_chart(&chart));
            match outcome {
                Ok(path) => {
                    info!("Chart {:02} written to {}", id.number(), path.display());
                    report.rendered.push((id, path));
                }
                Err(e) => {
                    error!("Chart {:02} ({}) failed: {e}", id.number(), id.slug());
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Draw one chart into the output directory and return the file path.
    pub fn render_chart(&self, chart: &ChartData) -> Result<PathBuf, RenderError> {
        let path = self.output_dir.join(chart.id.file_name());
        let size = self.scaled_size(chart.size);
        {
            let root = BitMapBackend::new(&path, size).into_drawing_area();
            draw_chart(&root, chart)?;
            root.present().map_err(drawing_err)?;
        }
        Ok(path)
    }

    fn scaled_size(&self, (w, h): (u32, u32)) -> (u32, u32) {
        match self.width {
            Some(width) if width > 0 => {
                let height = (h as f64 * width as f64 / w as f64).round() as u32;
                (width, height.max(1))
            }
            _ => (w, h),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Draw `chart` onto any plotters drawing area.
fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartData,
) -> Result<(), RenderError> {
    root.fill(&WHITE).map_err(drawing_err)?;
    match &chart.kind {
        ChartKind::Line { categories, series } => draw_line(root, chart, categories, series),
        ChartKind::Bar { categories, series } => draw_bars(root, chart, categories, series),
        ChartKind::HorizontalBar { categories, values } => {
            draw_horizontal_bars(root, chart, categories, values)
        }
        ChartKind::Pie { labels, values } => draw_pie(root, chart, labels, values),
    }
}

fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartData,
    categories: &[String],
    series: &[Series],
) -> Result<(), RenderError> {
    let values = series.iter().flat_map(|s| s.values.iter().flatten().copied());
    let (y_min, y_max) = value_range(values, false);

    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(category_axis(categories.len()), y_min..y_max)
        .map_err(drawing_err)?;

    ctx.configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .x_labels(categories.len())
        .x_label_formatter(&|x| category_label(categories, *x))
        .y_label_formatter(&|y| axis_label(*y))
        .draw()
        .map_err(drawing_err)?;

    for (idx, s) in series.iter().enumerate() {
        let color = s.color.unwrap_or(PALETTE[idx % PALETTE.len()]);
        // Gaps in the data break the line instead of bridging it
        for segment in contiguous_segments(&s.values) {
            ctx.draw_series(LineSeries::new(segment, color.stroke_width(2)))
                .map_err(drawing_err)?;
        }
        let points: Vec<(f64, f64)> = indexed_points(&s.values);
        ctx.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
            .map_err(drawing_err)?
            .label(s.name.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 14))
        .draw()
        .map_err(drawing_err)?;
    Ok(())
}

fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartData,
    categories: &[String],
    series: &[Series],
) -> Result<(), RenderError> {
    let values = series.iter().flat_map(|s| s.values.iter().flatten().copied());
    let (y_min, y_max) = value_range(values, true);

    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(category_axis(categories.len()), y_min..y_max)
        .map_err(drawing_err)?;

    ctx.configure_mesh()
        .disable_x_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .x_labels(categories.len())
        .x_label_formatter(&|x| category_label(categories, *x))
        .y_label_formatter(&|y| axis_label(*y))
        .draw()
        .map_err(drawing_err)?;

    let group_width = 0.8;
    let bar_width = group_width / series.len().max(1) as f64;

    for (j, s) in series.iter().enumerate() {
        let color = s.color.unwrap_or(PALETTE[j % PALETTE.len()]);
        let bars = s.values.iter().enumerate().filter_map(|(i, v)| {
            v.map(|v| {
                let left = i as f64 - group_width / 2.0 + j as f64 * bar_width;
                Rectangle::new([(left, 0.0), (left + bar_width, v)], color.filled())
            })
        });
        ctx.draw_series(bars)
            .map_err(drawing_err)?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 14))
        .draw()
        .map_err(drawing_err)?;
    Ok(())
}

fn draw_horizontal_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartData,
    categories: &[String],
    values: &[f64],
) -> Result<(), RenderError> {
    let n = categories.len();
    let (x_min, x_max) = value_range(values.iter().copied(), true);

    // First category sits at the top of the axis
    let row_of = |i: usize| (n - 1 - i) as f64;
    let label_of = |y: f64| {
        let row = y.round();
        if row < 0.0 || row >= n as f64 || (y - row).abs() > 1e-6 {
            return String::new();
        }
        categories
            .get(n - 1 - row as usize)
            .cloned()
            .unwrap_or_default()
    };

    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(140)
        .build_cartesian_2d(x_min..x_max, category_axis(n))
        .map_err(drawing_err)?;

    ctx.configure_mesh()
        .disable_y_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .y_labels(n)
        .x_label_formatter(&|x| axis_label(*x))
        .y_label_formatter(&|y| label_of(*y))
        .draw()
        .map_err(drawing_err)?;

    ctx.draw_series(values.iter().enumerate().map(|(i, &v)| {
        let color = VIRIDIS[(i * VIRIDIS.len() / n.max(1)).min(VIRIDIS.len() - 1)];
        let y = row_of(i);
        Rectangle::new([(0.0, y - 0.4), (v, y + 0.4)], color.filled())
    }))
    .map_err(drawing_err)?;
    Ok(())
}

fn draw_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    chart: &ChartData,
    labels: &[String],
    values: &[f64],
) -> Result<(), RenderError> {
    let area = root.titled(&chart.title, (FONT, 24)).map_err(drawing_err)?;
    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.32;
    let colors: Vec<RGBColor> = (0..values.len())
        .map(|i| PALETTE[i % PALETTE.len()])
        .collect();

    let mut pie = Pie::new(&center, &radius, values, &colors, labels);
    pie.start_angle(140.0);
    pie.label_style((FONT, 16).into_font().color(&BLACK));
    area.draw(&pie).map_err(drawing_err)?;
    Ok(())
}

/// Categorical axis: category `i` is centered on `i`.
fn category_axis(n: usize) -> Range<f64> {
    let upper = n.max(1) as f64 - 0.5;
    -0.5..upper
}

/// Label for an axis tick; ticks between two categories stay blank.
fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if idx < 0.0 || (x - idx).abs() > 1e-6 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

/// Tick label: thousands separators, one decimal for small fractional ticks.
fn axis_label(value: f64) -> String {
    if value.fract().abs() > 1e-9 && value.abs() < 100.0 {
        format!("{value:.1}")
    } else {
        format_thousands(value)
    }
}

fn indexed_points(values: &[Option<f64>]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect()
}

/// Split a series into runs of consecutive present values.
fn contiguous_segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(v) => current.push((i as f64, *v)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Axis range covering all values with 10% headroom.
fn value_range(values: impl Iterator<Item = f64>, from_zero: bool) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_infinite() {
        return (0.0, 1.0);
    }
    if from_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    let span = max - min;
    let pad = if span > 0.0 { span * 0.1 } else { max.abs().max(1.0) * 0.1 };
    let lower = if from_zero && min >= 0.0 { 0.0 } else { min - pad };
    (lower, max + pad)
}

fn drawing_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_pads_and_anchors_bars_at_zero() {
        assert_eq!(value_range([100.0, 200.0].into_iter(), false), (90.0, 210.0));
        assert_eq!(value_range([100.0, 200.0].into_iter(), true), (0.0, 220.0));
        assert_eq!(value_range(std::iter::empty(), true), (0.0, 1.0));

        let (lo, hi) = value_range([5.0].into_iter(), false);
        assert!(lo < 5.0 && hi > 5.0);
    }

    #[test]
    fn test_contiguous_segments_split_on_gaps() {
        let segments = contiguous_segments(&[Some(1.0), Some(2.0), None, Some(4.0), None]);
        assert_eq!(
            segments,
            vec![vec![(0.0, 1.0), (1.0, 2.0)], vec![(3.0, 4.0)]]
        );
    }

    #[test]
    fn test_category_label_lookup() {
        let categories = vec!["2018".to_string(), "2019".to_string()];
        assert_eq!(category_label(&categories, 0.0), "2018");
        assert_eq!(category_label(&categories, 1.0), "2019");
        assert_eq!(category_label(&categories, 0.5), "");
        assert_eq!(category_label(&categories, -1.0), "");
        assert_eq!(category_label(&categories, 5.0), "");
    }

    #[test]
    fn test_axis_label() {
        assert_eq!(axis_label(12500.0), "12,500");
        assert_eq!(axis_label(2.5), "2.5");
    }

    #[test]
    fn test_scaled_size_keeps_aspect_ratio() {
        let renderer = StaticChartRenderer::new("charts", Some(500));
        assert_eq!(renderer.scaled_size((1000, 600)), (500, 300));

        let renderer = StaticChartRenderer::new("charts", None);
        assert_eq!(renderer.scaled_size((800, 800)), (800, 800));
    }

    #[test]
    fn test_category_axis_centers_categories() {
        assert_eq!(category_axis(3), -0.5..2.5);
        assert_eq!(category_axis(0), -0.5..0.5);
    }

    #[test]
    fn test_render_all_writes_png_files() {
        use crate::data::columns::*;
        use polars::prelude::*;

        let country = df!(
            YEAR => ["2019", "2020"],
            TOTAL_ACCIDENTS => [100i64, 90],
            FATAL_ACCIDENTS => [40i64, 30],
            NON_FATAL_ACCIDENTS => [60i64, 60],
            INJURED => [120i64, 110],
            KILLED => [45i64, 35],
            VEHICLES_INVOLVED => [150i64, 140],
        )
        .unwrap();
        let region = df!(
            YEAR => ["2019", "2019", "2020", "2020"],
            REGION => ["Punjab", "Sindh", "Punjab", "Sindh"],
            TOTAL_ACCIDENTS => [70i64, 30, 50, 40],
            FATAL_ACCIDENTS => [30i64, 10, 20, 10],
            NON_FATAL_ACCIDENTS => [40i64, 20, 30, 30],
            INJURED => [80i64, 40, 60, 50],
            KILLED => [35i64, 10, 20, 15],
            VEHICLES_INVOLVED => [100i64, 50, 90, 50],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let renderer = StaticChartRenderer::new(dir.path(), Some(400));
        let report = renderer.render_all(&country, &region).unwrap();

        assert!(report.is_complete(), "{:?}", report.failed);
        assert_eq!(report.rendered.len(), 12);
        for (_, path) in &report.rendered {
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_render_all_isolates_failures() {
        use crate::data::columns::*;
        use polars::prelude::*;

        // Region table without a year column: every regional chart fails at
        // projection time, before anything is drawn.
        let region = df!(REGION => ["Punjab"]).unwrap();
        let country = df!(YEAR => ["2020"]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let renderer = StaticChartRenderer::new(dir.path().join("out"), None);
        let report = renderer.render_all(&country, &region).unwrap();

        assert_eq!(report.failed.len(), 12);
        assert!(report.rendered.is_empty());
        assert!(!report.is_complete());
        assert!(renderer.output_dir().is_dir());
    }
}
