//! Data module - workbook loading and table cleaning

pub mod columns;
mod loader;
mod processor;

pub use loader::{load_tables, RawTables};
pub use processor::{
    coerce_year, missing_counts, normalize_columns, numeric_values, resolve_missing,
    text_values, validate_schema, MissingValueStrategy, ProcessorError,
};
