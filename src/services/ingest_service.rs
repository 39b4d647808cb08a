//! Ingest Service
//!
//! Turns uploaded tables and feed rows into a deduplicated, hour-continuous
//! run of rows ready to merge into a series store. Nothing here touches the
//! database.

use crate::db::duckdb::models::SeriesRow;
use crate::db::sqlite::ForecastSettings;
use crate::error::{AppError, Result};
use crate::services::series_service::{to_epoch, SeriesKind, HOUR_SECS};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

const TIMESTAMP_COL: &str = "timestamp";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// When a row happened: an explicit instant or a date plus an hour label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowTime {
    Timestamp(NaiveDateTime),
    DateHour { date: NaiveDate, hour: u32 },
}

/// One incoming row before normalisation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestRow {
    pub time: RowTime,
    pub value: Option<f64>,
}

impl IngestRow {
    pub fn at(timestamp: NaiveDateTime, value: Option<f64>) -> Self {
        Self {
            time: RowTime::Timestamp(timestamp),
            value,
        }
    }

    pub fn date_hour(date: NaiveDate, hour: u32, value: Option<f64>) -> Self {
        Self {
            time: RowTime::DateHour { date, hour },
            value,
        }
    }
}

/// Header + records as read from an upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV stream with a header line
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect();

        let mut records = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, records })
    }

    /// Read a CSV file with a header line
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
}

/// Upload column names used to locate a series' data in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadColumns {
    pub value: String,
    pub date: String,
    pub hour: String,
}

impl UploadColumns {
    pub fn for_series(settings: &ForecastSettings, kind: SeriesKind) -> Self {
        Self {
            value: settings.value_col_for(kind).to_lowercase(),
            date: settings.date_col.to_lowercase(),
            hour: settings.hour_col.to_lowercase(),
        }
    }
}

/// Rows extracted from a table plus the non-fatal warnings raised on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    pub rows: Vec<IngestRow>,
    pub warnings: Vec<String>,
}

/// Header names arrive with stray spaces, quotes and mixed case
pub fn normalize_header(name: &str) -> String {
    name.trim_matches(|c| c == ' ' || c == '"').to_lowercase()
}

/// Parse an instant in any of the accepted upload formats
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Parse an hour label: `"7"`, `"0700"`, `"2400"` or `"07:00"`
pub fn parse_hour_label(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let digits = match raw.split_once(':') {
        Some((hours, _)) => hours,
        None if raw.len() > 2 && raw.ends_with("00") => &raw[..raw.len() - 2],
        None => raw,
    };
    digits.parse().ok()
}

pub(crate) fn parse_value(raw: &str) -> std::result::Result<Option<f64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| if v.is_finite() { Some(v) } else { None })
        .map_err(|_| ())
}

/// Extract rows for one series from an uploaded table
pub fn parse_table(table: &RawTable, columns: &UploadColumns) -> Result<ParsedTable> {
    if table.records.is_empty() {
        return Err(AppError::Validation("no rows".to_string()));
    }

    let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let timestamp_idx = position(TIMESTAMP_COL);
    let date_idx = position(&columns.date);
    let hour_idx = position(&columns.hour);
    let value_idx = position(&columns.value);

    if timestamp_idx.is_none() && (date_idx.is_none() || hour_idx.is_none()) {
        return Err(AppError::Validation(format!(
            "upload needs a \"{}\" column or both \"{}\" and \"{}\" columns",
            TIMESTAMP_COL, columns.date, columns.hour
        )));
    }

    let mut warnings = Vec::new();
    for header in &headers {
        let known = header == TIMESTAMP_COL
            || *header == columns.value
            || *header == columns.date
            || *header == columns.hour;
        if !known {
            warnings.push(format!("column \"{}\" will not be imported", header));
        }
    }
    if value_idx.is_none() {
        warnings.push(format!(
            "value column \"{}\" not found; rows will be stored as empty",
            columns.value
        ));
    }

    let cell = |record: &Vec<String>, idx: usize| -> String {
        record.get(idx).cloned().unwrap_or_default()
    };

    let mut rows = Vec::with_capacity(table.records.len());
    let mut unparseable_values = 0usize;

    for (line, record) in table.records.iter().enumerate() {
        let time = match timestamp_idx {
            Some(idx) => {
                let raw = cell(record, idx);
                let ts = parse_timestamp(&raw).ok_or_else(|| {
                    AppError::Validation(format!("row {}: unparseable timestamp \"{}\"", line + 1, raw))
                })?;
                RowTime::Timestamp(ts)
            }
            None => {
                // Both indices exist when there is no timestamp column
                let raw_date = cell(record, date_idx.unwrap_or_default());
                let raw_hour = cell(record, hour_idx.unwrap_or_default());
                let date = parse_date(&raw_date).ok_or_else(|| {
                    AppError::Validation(format!("row {}: unparseable date \"{}\"", line + 1, raw_date))
                })?;
                let hour = parse_hour_label(&raw_hour).ok_or_else(|| {
                    AppError::Validation(format!("row {}: unparseable hour \"{}\"", line + 1, raw_hour))
                })?;
                RowTime::DateHour { date, hour }
            }
        };

        let value = match value_idx {
            Some(idx) => parse_value(&cell(record, idx)).unwrap_or_else(|_| {
                unparseable_values += 1;
                None
            }),
            None => None,
        };

        rows.push(IngestRow { time, value });
    }

    if unparseable_values > 0 {
        warnings.push(format!(
            "{} value(s) in column \"{}\" were not numbers and were stored as empty",
            unparseable_values, columns.value
        ));
    }

    Ok(ParsedTable { rows, warnings })
}

/// Normalise incoming rows into a strictly continuous hourly run.
///
/// Hour labels on the 1-24 convention are shifted down by one for the whole
/// batch when a 24 appears. Timestamps are floored to the hour, duplicates
/// keep the last occurrence, and every missing hour between the first and
/// last row becomes a null placeholder.
pub fn normalize_rows(rows: &[IngestRow]) -> Result<Vec<SeriesRow>> {
    if rows.is_empty() {
        return Err(AppError::Validation("no rows".to_string()));
    }

    let shift_hours = rows
        .iter()
        .any(|r| matches!(r.time, RowTime::DateHour { hour: 24, .. }));

    let mut by_hour: BTreeMap<i64, Option<f64>> = BTreeMap::new();
    for row in rows {
        let timestamp = match row.time {
            RowTime::Timestamp(ts) => ts,
            RowTime::DateHour { date, hour } => {
                let hour = if shift_hours { hour.checked_sub(1) } else { Some(hour) };
                hour.and_then(|h| date.and_hms_opt(h, 0, 0)).ok_or_else(|| {
                    AppError::Validation(format!("hour label out of range on {}", date))
                })?
            }
        };
        let ts = to_epoch(timestamp);
        by_hour.insert(ts - ts.rem_euclid(HOUR_SECS), row.value);
    }

    let (first, last) = match (by_hour.keys().next(), by_hour.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(AppError::Validation("no rows".to_string())),
    };

    let resampled = (first..=last)
        .step_by(HOUR_SECS as usize)
        .map(|ts| SeriesRow {
            ts,
            value: by_hour.get(&ts).copied().flatten(),
        })
        .collect();

    Ok(resampled)
}
