//! DuckDB data models

use serde::{Deserialize, Serialize};

/// One stored hour of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    /// Epoch seconds of the naive hour
    pub ts: i64,
    pub value: Option<f64>,
}

/// Aggregate over a set of rows of one series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: i64,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
}

/// Outcome of a merge transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeCounts {
    pub inserted: usize,
    pub updated: usize,
    pub gap_filled: usize,
}
