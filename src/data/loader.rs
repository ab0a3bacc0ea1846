//! Workbook Loader Module
//! Reads the country and region sheets into Polars DataFrames.
//!
//! Two sources are accepted:
//! - a workbook file (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) read with calamine
//! - a directory holding one `<sheet name>.csv` per sheet, read with Polars

use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Cannot access input {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Sheet '{sheet}' not found (available: {available})")]
    MissingSheet { sheet: String, available: String },
    #[error("Sheet '{0}' is empty")]
    EmptySheet(String),
    #[error("Sheet '{sheet}' has duplicate header '{header}'")]
    DuplicateHeader { sheet: String, header: String },
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Failed to read sheet data: {0}")]
    Polars(#[from] PolarsError),
}

/// The two raw tables, with headers exactly as they appear in the source.
#[derive(Debug, Clone)]
pub struct RawTables {
    pub country: DataFrame,
    pub region: DataFrame,
}

/// Load the country and region sheets from `path`.
pub fn load_tables(
    path: &Path,
    country_sheet: &str,
    region_sheet: &str,
) -> Result<RawTables, LoaderError> {
    let metadata = std::fs::metadata(path).map_err(|source| LoaderError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    let (country, region) = if metadata.is_dir() {
        info!("Reading sheet CSV files from {}", path.display());
        (
            load_csv_sheet(path, country_sheet)?,
            load_csv_sheet(path, region_sheet)?,
        )
    } else {
        info!("Reading workbook {}", path.display());
        load_workbook(path, country_sheet, region_sheet)?
    };

    debug!(
        "Loaded '{}' {:?} and '{}' {:?}",
        country_sheet,
        country.shape(),
        region_sheet,
        region.shape()
    );
    Ok(RawTables { country, region })
}

fn load_workbook(
    path: &Path,
    country_sheet: &str,
    region_sheet: &str,
) -> Result<(DataFrame, DataFrame), LoaderError> {
    // Opening it ourselves first separates unreadable paths from corrupt workbooks.
    std::fs::File::open(path).map_err(|source| LoaderError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();

    let mut read_sheet = |sheet: &str| -> Result<DataFrame, LoaderError> {
        if !names.iter().any(|n| n == sheet) {
            return Err(LoaderError::MissingSheet {
                sheet: sheet.to_string(),
                available: names.join(", "),
            });
        }
        let range = workbook.worksheet_range(sheet)?;
        range_to_frame(sheet, &range)
    };

    let country = read_sheet(country_sheet)?;
    let region = read_sheet(region_sheet)?;
    Ok((country, region))
}

fn load_csv_sheet(dir: &Path, sheet: &str) -> Result<DataFrame, LoaderError> {
    let file_path = dir.join(format!("{sheet}.csv"));
    if !file_path.is_file() {
        return Err(LoaderError::MissingSheet {
            sheet: sheet.to_string(),
            available: csv_sheet_names(dir).join(", "),
        });
    }

    let df = LazyCsvReader::new(&file_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .finish()?
        .collect()?;

    if df.width() == 0 {
        return Err(LoaderError::EmptySheet(sheet.to_string()));
    }
    Ok(df)
}

fn csv_sheet_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
                .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Convert a worksheet range into a DataFrame, using its first row as header.
fn range_to_frame(sheet: &str, range: &Range<Data>) -> Result<DataFrame, LoaderError> {
    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| LoaderError::EmptySheet(sheet.to_string()))?;
    let body: Vec<&[Data]> = rows.collect();

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(header_row.len());

    for (idx, header_cell) in header_row.iter().enumerate() {
        let header = match header_cell {
            Data::Empty => format!("Unnamed: {idx}"),
            other => other.to_string(),
        };
        if !seen.insert(header.clone()) {
            return Err(LoaderError::DuplicateHeader {
                sheet: sheet.to_string(),
                header,
            });
        }

        let cells: Vec<&Data> = body
            .iter()
            .map(|row| row.get(idx).unwrap_or(&Data::Empty))
            .collect();
        columns.push(build_column(&header, &cells));
    }

    Ok(DataFrame::new(columns)?)
}

fn is_missing(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Type a column from its cells: Int64 when every value is integral, Float64
/// when every value is numeric, String otherwise.
fn build_column(name: &str, cells: &[&Data]) -> Column {
    let numeric = cells
        .iter()
        .all(|c| is_missing(c) || matches!(c, Data::Int(_) | Data::Float(_)));

    if numeric {
        let integral = cells.iter().all(|c| match c {
            Data::Float(f) => f.is_finite() && f.fract() == 0.0,
            _ => true,
        });
        if integral {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(i) => Some(*i),
                    Data::Float(f) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            return Column::new(name.into(), values);
        }
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Data::Int(i) => Some(*i as f64),
                Data::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|c| {
            if is_missing(c) {
                None
            } else {
                Some(c.to_string())
            }
        })
        .collect();
    Column::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_sheets(dir: &Path) {
        fs::write(
            dir.join("Country.csv"),
            "Year,Total Number of Accidents,Fatal Accidents\n2018,100,40\n2019,,45\n2020,200,50\n",
        )
        .unwrap();
        fs::write(
            dir.join("By Region.csv"),
            "Year,Region,Total Number of Accidents\n2020,Punjab,120\n2020,Sindh,80\n",
        )
        .unwrap();
    }

    #[test]
    fn test_missing_path_is_file_access_error() {
        let err = load_tables(Path::new("/no/such/workbook.xlsx"), "Country", "By Region")
            .unwrap_err();
        assert!(matches!(err, LoaderError::FileAccess { .. }), "{err}");
    }

    #[test]
    fn test_csv_directory_keeps_source_headers() {
        let dir = tempfile::tempdir().unwrap();
        write_sheets(dir.path());

        let tables = load_tables(dir.path(), "Country", "By Region").unwrap();
        assert_eq!(
            tables.country.get_column_names_str(),
            vec!["Year", "Total Number of Accidents", "Fatal Accidents"]
        );
        assert_eq!(tables.country.height(), 3);
        assert_eq!(tables.region.height(), 2);
        assert_eq!(
            tables
                .country
                .column("Total Number of Accidents")
                .unwrap()
                .null_count(),
            1,
            "Empty CSV cells should load as nulls"
        );
    }

    #[test]
    fn test_missing_sheet_is_reported_with_available_names() {
        let dir = tempfile::tempdir().unwrap();
        write_sheets(dir.path());

        let err = load_tables(dir.path(), "Country", "Provinces").unwrap_err();
        match err {
            LoaderError::MissingSheet { sheet, available } => {
                assert_eq!(sheet, "Provinces");
                assert!(available.contains("By Region"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_workbook_is_workbook_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();

        let err = load_tables(&path, "Country", "By Region").unwrap_err();
        assert!(matches!(err, LoaderError::Workbook(_)), "{err}");
    }

    #[test]
    fn test_range_to_frame_types_columns() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("Year".into()));
        range.set_value((0, 1), Data::String("Region".into()));
        range.set_value((0, 2), Data::String("Killed".into()));
        range.set_value((1, 0), Data::Float(2019.0));
        range.set_value((1, 1), Data::String("Punjab".into()));
        range.set_value((1, 2), Data::Int(12));
        range.set_value((2, 0), Data::Float(2020.0));
        range.set_value((2, 1), Data::String("Sindh".into()));
        range.set_value((3, 0), Data::Float(2020.0));
        range.set_value((3, 1), Data::String("KP".into()));
        range.set_value((3, 2), Data::Float(7.5));

        let df = range_to_frame("By Region", &range).unwrap();
        assert_eq!(df.column("Year").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Region").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Killed").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Killed").unwrap().null_count(), 1);
    }

    #[test]
    fn test_range_to_frame_rejects_duplicate_headers() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("Injured".into()));
        range.set_value((0, 1), Data::String("Injured".into()));
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::Int(2));

        let err = range_to_frame("Country", &range).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateHeader { .. }), "{err}");
    }

    #[test]
    fn test_mixed_text_column_stays_text() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 0));
        range.set_value((0, 0), Data::String("Injured".into()));
        range.set_value((1, 0), Data::Int(10));
        range.set_value((2, 0), Data::String("n/a".into()));

        let df = range_to_frame("Country", &range).unwrap();
        assert_eq!(df.column("Injured").unwrap().dtype(), &DataType::String);
    }
}
