//! Snapshot Service
//!
//! Builds the training table handed to the trainer: joined historical hours
//! followed by the forecast-weather hours of the window, with every
//! incomplete calendar day dropped.

use crate::error::Result;
use crate::services::series_service::{ReadinessWindow, SeriesPoint, TimeSeriesStore};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// File name of the snapshot inside a job directory
pub const SNAPSHOT_FILE: &str = "cached-dataframe.csv";

const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub dates: NaiveDateTime,
    pub load: Option<f64>,
    pub tempc: Option<f64>,
}

/// Training-ready table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTable {
    pub rows: Vec<SnapshotRow>,
}

impl SnapshotTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with no load, i.e. the hours to forecast
    pub fn forecast_rows(&self) -> impl Iterator<Item = &SnapshotRow> {
        self.rows.iter().filter(|row| row.load.is_none())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        // An empty table still gets its header
        if self.rows.is_empty() {
            writer.write_record(["dates", "load", "tempc"])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<SnapshotRow>, _>>()?;
        Ok(Self { rows })
    }
}

pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build the snapshot for `window` from the three stores
    pub fn build(
        load: &TimeSeriesStore,
        historical_weather: &TimeSeriesStore,
        forecast_weather: &TimeSeriesStore,
        window: &ReadinessWindow,
    ) -> Result<SnapshotTable> {
        let table = Self::build_from_points(
            &load.export()?,
            &historical_weather.export()?,
            &forecast_weather.export()?,
            window,
        );
        info!(
            "Built snapshot for {} .. {}: {} rows",
            window.start_date,
            window.end_date,
            table.len()
        );
        Ok(table)
    }

    pub fn build_from_points(
        load: &[SeriesPoint],
        historical_weather: &[SeriesPoint],
        forecast_weather: &[SeriesPoint],
        window: &ReadinessWindow,
    ) -> SnapshotTable {
        let mut rows = historical_rows(load, historical_weather, window.start_date);
        rows.extend(forecast_rows(forecast_weather, window));

        let before = rows.len();
        let rows = drop_partial_days(rows);
        debug!("Dropped {} rows from incomplete days", before - rows.len());

        SnapshotTable { rows }
    }
}

/// Inner join on timestamp, resampled hourly and interpolated
fn historical_rows(
    load: &[SeriesPoint],
    historical_weather: &[SeriesPoint],
    cutoff: NaiveDateTime,
) -> Vec<SnapshotRow> {
    let weather: HashMap<NaiveDateTime, Option<f64>> = historical_weather
        .iter()
        .map(|p| (p.timestamp, p.value))
        .collect();

    let joined: BTreeMap<NaiveDateTime, (Option<f64>, Option<f64>)> = load
        .iter()
        .filter(|p| p.timestamp < cutoff)
        .filter_map(|p| weather.get(&p.timestamp).map(|t| (p.timestamp, (p.value, *t))))
        .collect();

    let (first, last) = match (joined.keys().next(), joined.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    let mut timestamps = Vec::new();
    let mut loads = Vec::new();
    let mut temps = Vec::new();
    let mut current = first;
    while current <= last {
        let (l, t) = joined.get(&current).copied().unwrap_or((None, None));
        timestamps.push(current);
        loads.push(l);
        temps.push(t);
        current += Duration::hours(1);
    }

    interpolate_bounded(&mut loads);
    interpolate_bounded(&mut temps);

    timestamps
        .into_iter()
        .zip(loads.into_iter().zip(temps))
        .map(|(dates, (load, tempc))| SnapshotRow { dates, load, tempc })
        .collect()
}

/// Forecast-weather hours inside the window, load left empty
fn forecast_rows(forecast_weather: &[SeriesPoint], window: &ReadinessWindow) -> Vec<SnapshotRow> {
    let points: Vec<&SeriesPoint> = forecast_weather
        .iter()
        .filter(|p| p.timestamp >= window.start_date && p.timestamp <= window.end_date)
        .collect();

    let mut temps: Vec<Option<f64>> = points.iter().map(|p| p.value).collect();
    interpolate_bounded(&mut temps);

    points
        .into_iter()
        .zip(temps)
        .map(|(p, tempc)| SnapshotRow {
            dates: p.timestamp,
            load: None,
            tempc,
        })
        .collect()
}

/// Fill nulls linearly between known values and with the nearest known
/// value at either edge. A column with no known value stays empty.
pub fn interpolate_bounded(values: &mut [Option<f64>]) {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (first, last) = match (known.first(), known.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return,
    };

    let first_value = values[first];
    for value in values.iter_mut().take(first) {
        *value = first_value;
    }
    let last_value = values[last];
    for value in values.iter_mut().skip(last + 1) {
        *value = last_value;
    }

    for pair in known.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if right - left < 2 {
            continue;
        }
        if let (Some(a), Some(b)) = (values[left], values[right]) {
            let span = (right - left) as f64;
            for i in left + 1..right {
                let fraction = (i - left) as f64 / span;
                values[i] = Some(a + (b - a) * fraction);
            }
        }
    }
}

fn drop_partial_days(rows: Vec<SnapshotRow>) -> Vec<SnapshotRow> {
    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for row in &rows {
        *per_day.entry(row.dates.date()).or_default() += 1;
    }

    rows.into_iter()
        .filter(|row| per_day.get(&row.dates.date()) == Some(&HOURS_PER_DAY))
        .collect()
}
