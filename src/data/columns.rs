//! Normalized column names of the accident tables. These are the labels left
//! after `normalize_columns` has run over the source sheet headers.

pub const YEAR: &str = "year";
pub const REGION: &str = "region";

pub const TOTAL_ACCIDENTS: &str = "total_number_of_accidents";
pub const FATAL_ACCIDENTS: &str = "fatal_accidents";
pub const NON_FATAL_ACCIDENTS: &str = "non-fatal_accidents";
pub const INJURED: &str = "injured";
pub const KILLED: &str = "killed";
pub const VEHICLES_INVOLVED: &str = "total_number_of_vehicles_involved";

/// Numeric columns shared by the country and region tables.
pub const METRICS: [&str; 6] = [
    TOTAL_ACCIDENTS,
    FATAL_ACCIDENTS,
    NON_FATAL_ACCIDENTS,
    INJURED,
    KILLED,
    VEHICLES_INVOLVED,
];

/// Text columns required in the country table.
pub const COUNTRY_TEXT: [&str; 1] = [YEAR];

/// Text columns required in the region table.
pub const REGION_TEXT: [&str; 2] = [YEAR, REGION];
