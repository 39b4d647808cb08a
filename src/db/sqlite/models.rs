//! SQLite database models

use crate::services::SeriesKind;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Train/test accuracy reported by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub train: f64,
    pub test: f64,
}

/// Forecast job model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastJob {
    /// Creation-instant slug, also the job directory name
    pub id: String,
    pub created_at: NaiveDateTime,
    /// First forecast hour
    pub start_date: NaiveDateTime,
    /// Last forecast hour
    pub end_date: NaiveDateTime,
    /// The job's exclusive directory
    pub output_dir: PathBuf,
    pub epochs: u32,
    pub accuracy: Option<Accuracy>,
    pub forecast_values: Option<Vec<f64>>,
    pub artifact_path: Option<PathBuf>,
}

/// Forecast settings (single row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Forecast horizon in hours
    pub hours_prior: u32,
    pub epochs: u32,
    // Upload column names
    pub load_col: String,
    pub temp_col: String,
    pub hour_col: String,
    pub date_col: String,
    /// Where a weather sync starts when its store is empty
    pub earliest_sync_date: NaiveDate,
    pub min_historical_load: usize,
    pub min_historical_weather: usize,
    pub min_forecast_weather: usize,
}

impl ForecastSettings {
    /// Non-null hours a series needs before it reports readiness
    pub fn minimum_for(&self, kind: SeriesKind) -> usize {
        match kind {
            SeriesKind::HistoricalLoad => self.min_historical_load,
            SeriesKind::HistoricalWeather => self.min_historical_weather,
            SeriesKind::ForecastWeather => self.min_forecast_weather,
        }
    }

    /// Upload column holding the value of a series
    pub fn value_col_for(&self, kind: SeriesKind) -> &str {
        match kind {
            SeriesKind::HistoricalLoad => &self.load_col,
            SeriesKind::HistoricalWeather | SeriesKind::ForecastWeather => &self.temp_col,
        }
    }
}

/// Partial update of the forecast settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastSettingsUpdate {
    pub hours_prior: Option<u32>,
    pub epochs: Option<u32>,
    pub load_col: Option<String>,
    pub temp_col: Option<String>,
    pub hour_col: Option<String>,
    pub date_col: Option<String>,
    pub earliest_sync_date: Option<NaiveDate>,
    pub min_historical_load: Option<usize>,
    pub min_historical_weather: Option<usize>,
    pub min_forecast_weather: Option<usize>,
}
