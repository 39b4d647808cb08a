//! Sync Service
//!
//! Pulls weather rows from an external feed into a series store.

use crate::error::{AppError, Result};
use crate::services::ingest_service::{self, IngestRow, RawTable};
use crate::services::series_service::{IngestReport, SeriesKind, TimeSeriesStore};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Row returned by a weather feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedRow {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// External source of hourly weather
#[async_trait]
pub trait WeatherFeed: Send + Sync {
    /// Feed name for logs
    fn name(&self) -> &str;

    /// Rows between two dates, inclusive
    async fn fetch(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<FeedRow>>;
}

/// Feed backed by an external program.
///
/// Run as `<program> <args..> <series> <start_date> <end_date>`, it prints a
/// CSV with `timestamp` and `value` columns on stdout.
#[derive(Debug, Clone)]
pub struct CommandFeed {
    program: String,
    args: Vec<String>,
    series: SeriesKind,
}

impl CommandFeed {
    pub fn new(program: impl Into<String>, args: Vec<String>, series: SeriesKind) -> Self {
        Self {
            program: program.into(),
            args,
            series,
        }
    }
}

#[async_trait]
impl WeatherFeed for CommandFeed {
    fn name(&self) -> &str {
        &self.program
    }

    async fn fetch(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<FeedRow>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(self.series.key())
            .arg(start_date.to_string())
            .arg(end_date.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::Feed(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AppError::Feed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_feed_csv(&output.stdout)
    }
}

/// Rows from a feed's `timestamp,value` CSV
pub fn parse_feed_csv(bytes: &[u8]) -> Result<Vec<FeedRow>> {
    let table = RawTable::from_csv_reader(bytes)
        .map_err(|e| AppError::Feed(format!("unreadable feed output: {}", e)))?;

    let headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| ingest_service::normalize_header(h))
        .collect();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::Feed(format!("feed output has no \"{}\" column", name)))
    };
    let timestamp_idx = column("timestamp")?;
    let value_idx = column("value")?;

    let mut rows = Vec::with_capacity(table.records.len());
    for record in &table.records {
        let raw = record.get(timestamp_idx).map(String::as_str).unwrap_or_default();
        let timestamp = ingest_service::parse_timestamp(raw)
            .ok_or_else(|| AppError::Feed(format!("unparseable feed timestamp \"{}\"", raw)))?;
        let value = record
            .get(value_idx)
            .and_then(|raw| ingest_service::parse_value(raw).ok())
            .flatten();
        rows.push(FeedRow { timestamp, value });
    }

    debug!("Feed returned {} rows", rows.len());
    Ok(rows)
}

pub struct SyncService;

impl SyncService {
    /// Dates to request: from the newest stored day (or `earliest` when the
    /// store is empty) through tomorrow.
    pub fn sync_range(
        store: &TimeSeriesStore,
        earliest: NaiveDate,
        today: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate)> {
        let start = store
            .latest_timestamp()?
            .map(|ts| ts.date())
            .unwrap_or(earliest);
        Ok((start, today + Duration::days(1)))
    }

    /// Fetch from `feed` and ingest into `store`
    pub async fn sync_series(
        store: &TimeSeriesStore,
        feed: &dyn WeatherFeed,
        earliest: NaiveDate,
        today: NaiveDate,
    ) -> Result<IngestReport> {
        let (start, end) = Self::sync_range(store, earliest, today)?;
        info!(
            "Syncing {} from {} ({} .. {})",
            store.friendly_name(),
            feed.name(),
            start,
            end
        );

        let rows: Vec<IngestRow> = feed
            .fetch(start, end)
            .await?
            .into_iter()
            .map(|row| IngestRow::at(row.timestamp, row.value))
            .collect();

        store.ingest(&rows)
    }
}
