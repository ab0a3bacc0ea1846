//! Statistics module - aggregation and consistency checks

mod calculator;
mod consistency;

pub use calculator::{
    describe, group_mean, latest_year_subset, ordered_years, total_and_mean, ColumnSummary,
    StatsError,
};
pub use consistency::{check_consistency, ConsistencyIssue, ReconciliationMode};
