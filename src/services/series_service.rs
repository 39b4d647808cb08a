//! Series Service
//!
//! `TimeSeriesStore` is one hourly series held in DuckDB. Every ingest is
//! resampled to a gap-free hourly index and merged without ever replacing a
//! known value with a null.

use crate::db::duckdb::models::SeriesRow;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::ForecastSettings;
use crate::error::{AppError, Result};
use crate::services::ingest_service::{self, IngestRow, RawTable, UploadColumns};
use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) const HOUR_SECS: i64 = 3600;

pub(crate) fn to_epoch(timestamp: NaiveDateTime) -> i64 {
    timestamp.and_utc().timestamp()
}

pub(crate) fn from_epoch(ts: i64) -> NaiveDateTime {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// The three logical series the forecaster works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    HistoricalLoad,
    HistoricalWeather,
    ForecastWeather,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 3] = [
        SeriesKind::HistoricalLoad,
        SeriesKind::HistoricalWeather,
        SeriesKind::ForecastWeather,
    ];

    /// Key under which rows are stored
    pub fn key(&self) -> &'static str {
        match self {
            SeriesKind::HistoricalLoad => "historical_load",
            SeriesKind::HistoricalWeather => "historical_weather",
            SeriesKind::ForecastWeather => "forecast_weather",
        }
    }

    pub fn friendly_name(&self) -> &'static str {
        match self {
            SeriesKind::HistoricalLoad => "Historical Load",
            SeriesKind::HistoricalWeather => "Historical Temperature",
            SeriesKind::ForecastWeather => "Forecast Temperature",
        }
    }

    pub fn default_minimum(&self) -> usize {
        match self {
            SeriesKind::HistoricalLoad | SeriesKind::HistoricalWeather => 24 * 365 * 3,
            SeriesKind::ForecastWeather => 24,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SeriesKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        SeriesKind::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| AppError::Validation(format!("Unknown series: {}", s)))
    }
}

/// One hour of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// Outcome of an ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    /// Null placeholders added between the existing range and the new rows
    pub gap_filled: usize,
    pub warnings: Vec<String>,
}

/// Inclusive range of usable hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessWindow {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
}

/// Missing-value report for a series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingValues {
    pub count: usize,
    /// Longest run of consecutive null hours
    pub max_span: usize,
    pub span_start: Option<NaiveDateTime>,
    pub span_end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub series: SeriesKind,
    pub friendly_name: String,
    pub count: usize,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub missing_values: MissingValues,
}

/// Persistent hourly store for one series
#[derive(Clone)]
pub struct TimeSeriesStore {
    db: Arc<DuckDb>,
    kind: SeriesKind,
    minimum_data_required: usize,
}

impl TimeSeriesStore {
    pub fn new(db: Arc<DuckDb>, kind: SeriesKind, minimum_data_required: usize) -> Self {
        Self {
            db,
            kind,
            minimum_data_required,
        }
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub fn friendly_name(&self) -> &'static str {
        self.kind.friendly_name()
    }

    pub fn minimum_data_required(&self) -> usize {
        self.minimum_data_required
    }

    /// Ingest already-extracted rows
    pub fn ingest(&self, rows: &[IngestRow]) -> Result<IngestReport> {
        let normalized = ingest_service::normalize_rows(rows)?;
        self.merge(&normalized, Vec::new())
    }

    /// Ingest an uploaded table, locating columns by their configured names
    pub fn ingest_table(&self, table: &RawTable, columns: &UploadColumns) -> Result<IngestReport> {
        let parsed = ingest_service::parse_table(table, columns)?;
        for warning in &parsed.warnings {
            warn!("{} upload: {}", self.kind.friendly_name(), warning);
        }
        let normalized = ingest_service::normalize_rows(&parsed.rows)?;
        self.merge(&normalized, parsed.warnings)
    }

    fn merge(&self, rows: &[SeriesRow], warnings: Vec<String>) -> Result<IngestReport> {
        let gap_rows = self.gap_rows(rows)?;
        debug!(
            "Merging {} rows into {} ({} gap hours)",
            rows.len(),
            self.kind,
            gap_rows.len()
        );

        let counts = self.db.merge_series_points(self.kind.key(), rows, &gap_rows)?;

        info!(
            "Ingested {}: {} inserted, {} updated, {} gap hours filled",
            self.kind.friendly_name(),
            counts.inserted,
            counts.updated,
            counts.gap_filled
        );

        Ok(IngestReport {
            inserted: counts.inserted,
            updated: counts.updated,
            gap_filled: counts.gap_filled,
            warnings,
        })
    }

    /// Hours between the stored range and a continuous incoming run
    fn gap_rows(&self, rows: &[SeriesRow]) -> Result<Vec<i64>> {
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first.ts, last.ts),
            _ => return Ok(Vec::new()),
        };

        let extent = self.db.series_extent(self.kind.key())?;
        let (stored_first, stored_last) = match (extent.first_ts, extent.last_ts) {
            (Some(f), Some(l)) => (f, l),
            _ => return Ok(Vec::new()),
        };

        let mut gaps = Vec::new();
        if first > stored_last + HOUR_SECS {
            gaps.extend((stored_last + HOUR_SECS..first).step_by(HOUR_SECS as usize));
        }
        if last + HOUR_SECS < stored_first {
            gaps.extend((last + HOUR_SECS..stored_first).step_by(HOUR_SECS as usize));
        }
        Ok(gaps)
    }

    /// Every stored hour in ascending order, nulls included
    pub fn export(&self) -> Result<Vec<SeriesPoint>> {
        let rows = self.db.query_series(self.kind.key())?;
        Ok(rows
            .into_iter()
            .map(|row| SeriesPoint {
                timestamp: from_epoch(row.ts),
                value: row.value,
            })
            .collect())
    }

    /// Bounds of the non-null data, or `None` below the minimum
    pub fn readiness(&self) -> Result<Option<ReadinessWindow>> {
        let stats = self.db.series_value_extent(self.kind.key())?;
        if stats.count <= 0 || (stats.count as usize) < self.minimum_data_required {
            return Ok(None);
        }

        match (stats.first_ts, stats.last_ts) {
            (Some(first), Some(last)) => Ok(Some(ReadinessWindow {
                start_date: from_epoch(first),
                end_date: from_epoch(last),
            })),
            _ => Ok(None),
        }
    }

    pub fn latest_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        let stats = self.db.series_extent(self.kind.key())?;
        Ok(stats.last_ts.map(from_epoch))
    }

    /// Stored hours, nulls included
    pub fn len(&self) -> Result<usize> {
        Ok(self.db.series_extent(self.kind.key())?.count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<usize> {
        let deleted = self.db.clear_series(self.kind.key())?;
        info!("Cleared {} ({} rows)", self.kind.friendly_name(), deleted);
        Ok(deleted)
    }

    pub fn summary(&self) -> Result<Option<SeriesSummary>> {
        let points = self.export()?;
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => return Ok(None),
        };

        Ok(Some(SeriesSummary {
            series: self.kind,
            friendly_name: self.kind.friendly_name().to_string(),
            count: points.len(),
            start_datetime: first,
            end_datetime: last,
            missing_values: missing_values(&points),
        }))
    }
}

/// The three stores, thresholds taken from the forecast settings
#[derive(Clone)]
pub struct SeriesStores {
    pub historical_load: TimeSeriesStore,
    pub historical_weather: TimeSeriesStore,
    pub forecast_weather: TimeSeriesStore,
}

impl SeriesStores {
    pub fn new(db: Arc<DuckDb>, settings: &ForecastSettings) -> Self {
        let store = |kind: SeriesKind| {
            TimeSeriesStore::new(db.clone(), kind, settings.minimum_for(kind))
        };
        Self {
            historical_load: store(SeriesKind::HistoricalLoad),
            historical_weather: store(SeriesKind::HistoricalWeather),
            forecast_weather: store(SeriesKind::ForecastWeather),
        }
    }

    pub fn get(&self, kind: SeriesKind) -> &TimeSeriesStore {
        match kind {
            SeriesKind::HistoricalLoad => &self.historical_load,
            SeriesKind::HistoricalWeather => &self.historical_weather,
            SeriesKind::ForecastWeather => &self.forecast_weather,
        }
    }
}

/// Count nulls and locate the longest run of them
pub fn missing_values(points: &[SeriesPoint]) -> MissingValues {
    let mut report = MissingValues::default();
    let mut run = 0usize;
    let mut run_start = None;

    for point in points {
        if point.value.is_some() {
            run = 0;
            continue;
        }

        report.count += 1;
        if run == 0 {
            run_start = Some(point.timestamp);
        }
        run += 1;

        if run > report.max_span {
            report.max_span = run;
            report.span_start = run_start;
            report.span_end = Some(point.timestamp);
        }
    }

    report
}

/// Offset a timestamp by whole hours
pub(crate) fn add_hours(timestamp: NaiveDateTime, hours: i64) -> NaiveDateTime {
    timestamp + Duration::hours(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn store(minimum: usize) -> TimeSeriesStore {
        let db = Arc::new(DuckDb::open_in_memory().unwrap());
        TimeSeriesStore::new(db, SeriesKind::HistoricalLoad, minimum)
    }

    fn values(store: &TimeSeriesStore) -> Vec<(NaiveDateTime, Option<f64>)> {
        store
            .export()
            .unwrap()
            .into_iter()
            .map(|p| (p.timestamp, p.value))
            .collect()
    }

    fn assert_continuous(store: &TimeSeriesStore) {
        let points = store.export().unwrap();
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
    }

    #[test]
    fn test_ingest_fills_hole_with_null() {
        let store = store(1);
        let report = store
            .ingest(&[IngestRow::at(ts(1, 0), Some(10.0)), IngestRow::at(ts(1, 2), Some(30.0))])
            .unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(
            values(&store),
            vec![(ts(1, 0), Some(10.0)), (ts(1, 1), None), (ts(1, 2), Some(30.0))]
        );
    }

    #[test]
    fn test_null_never_replaces_value() {
        let store = store(1);
        store.ingest(&[IngestRow::at(ts(1, 0), Some(10.0))]).unwrap();

        let report = store.ingest(&[IngestRow::at(ts(1, 0), None)]).unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(values(&store), vec![(ts(1, 0), Some(10.0))]);

        let report = store.ingest(&[IngestRow::at(ts(1, 0), Some(11.0))]).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(values(&store), vec![(ts(1, 0), Some(11.0))]);
    }

    #[test]
    fn test_disjoint_ingest_keeps_store_continuous() {
        let store = store(1);
        store.ingest(&[IngestRow::at(ts(1, 0), Some(1.0))]).unwrap();

        let report = store.ingest(&[IngestRow::at(ts(1, 4), Some(5.0))]).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.gap_filled, 3);

        let report = store.ingest(&[IngestRow::at(ts(1, 0) - Duration::hours(2), Some(0.0))]).unwrap();
        assert_eq!(report.gap_filled, 1);

        assert_eq!(store.len().unwrap(), 7);
        assert_continuous(&store);
    }

    #[test]
    fn test_readiness_threshold() {
        let store = store(3);
        store
            .ingest(&[
                IngestRow::at(ts(1, 0), Some(1.0)),
                IngestRow::at(ts(1, 1), None),
                IngestRow::at(ts(1, 2), Some(2.0)),
            ])
            .unwrap();
        assert_eq!(store.readiness().unwrap(), None);

        store.ingest(&[IngestRow::at(ts(1, 3), Some(3.0))]).unwrap();
        assert_eq!(
            store.readiness().unwrap(),
            Some(ReadinessWindow {
                start_date: ts(1, 0),
                end_date: ts(1, 3),
            })
        );
    }

    #[test]
    fn test_readiness_ignores_trailing_nulls() {
        let store = store(1);
        store
            .ingest(&[IngestRow::at(ts(1, 0), Some(1.0)), IngestRow::at(ts(1, 5), None)])
            .unwrap();

        let window = store.readiness().unwrap().unwrap();
        assert_eq!(window.end_date, ts(1, 0));
        assert_eq!(store.latest_timestamp().unwrap(), Some(ts(1, 5)));
    }

    #[test]
    fn test_empty_store() {
        let store = store(0);
        assert_eq!(store.readiness().unwrap(), None);
        assert_eq!(store.summary().unwrap(), None);
        assert!(store.is_empty().unwrap());
        assert!(matches!(store.ingest(&[]), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_summary_reports_longest_null_run() {
        let store = store(1);
        store
            .ingest(&[
                IngestRow::at(ts(1, 0), Some(1.0)),
                IngestRow::at(ts(1, 2), Some(2.0)),
                IngestRow::at(ts(1, 6), Some(3.0)),
            ])
            .unwrap();

        let summary = store.summary().unwrap().unwrap();
        assert_eq!(summary.count, 7);
        assert_eq!(summary.start_datetime, ts(1, 0));
        assert_eq!(summary.end_datetime, ts(1, 6));
        assert_eq!(
            summary.missing_values,
            MissingValues {
                count: 4,
                max_span: 3,
                span_start: Some(ts(1, 3)),
                span_end: Some(ts(1, 5)),
            }
        );
    }

    #[test]
    fn test_clear() {
        let store = store(1);
        store.ingest(&[IngestRow::at(ts(1, 0), Some(1.0))]).unwrap();
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.export().unwrap().is_empty());
    }

    #[test]
    fn test_series_kind_parsing() {
        assert_eq!("historical-load".parse::<SeriesKind>().unwrap(), SeriesKind::HistoricalLoad);
        assert_eq!("FORECAST_WEATHER".parse::<SeriesKind>().unwrap(), SeriesKind::ForecastWeather);
        assert!("wind".parse::<SeriesKind>().is_err());
    }

    #[test]
    fn test_ingest_table_reports_warnings() {
        let store = store(1);
        let table = RawTable::from_csv_reader(
            "timestamp,kw,site\n2022-01-01 00:00:00,4,a\n2022-01-01 01:00:00,5,a\n".as_bytes(),
        )
        .unwrap();
        let columns = UploadColumns {
            value: "kw".to_string(),
            date: "date".to_string(),
            hour: "hour".to_string(),
        };

        let report = store.ingest_table(&table, &columns).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.warnings, vec!["column \"site\" will not be imported".to_string()]);
    }
}
