//! SQLite database module

pub mod models;
mod connection;
mod migrations;
mod jobs;
mod settings;

use crate::error::Result;
pub use models::{Accuracy, ForecastJob, ForecastSettings, ForecastSettingsUpdate};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = connection::create_connection(path)?;
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Forecast Job Methods ==========

    /// Persist a newly created job
    pub fn insert_job(&self, job: &ForecastJob) -> Result<()> {
        let conn = self.conn.lock();
        jobs::insert_job(&conn, job)
    }

    /// Get a job by id
    pub fn get_job(&self, id: &str) -> Result<ForecastJob> {
        let conn = self.conn.lock();
        jobs::get_job(&conn, id)
    }

    /// All jobs, newest first
    pub fn list_jobs(&self) -> Result<Vec<ForecastJob>> {
        let conn = self.conn.lock();
        jobs::list_jobs(&conn)
    }

    /// Store the trainer's accuracy, forecast and artifact location
    pub fn record_job_result(
        &self,
        id: &str,
        accuracy: Accuracy,
        forecast_values: &[f64],
        artifact_path: Option<&Path>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        jobs::record_job_result(&conn, id, accuracy, forecast_values, artifact_path)
    }

    // ========== Settings Methods ==========

    /// Get forecast settings
    pub fn get_forecast_settings(&self) -> Result<ForecastSettings> {
        let conn = self.conn.lock();
        settings::get_forecast_settings(&conn)
    }

    /// Update forecast settings
    pub fn update_forecast_settings(
        &self,
        update: ForecastSettingsUpdate,
    ) -> Result<ForecastSettings> {
        let conn = self.conn.lock();
        settings::update_forecast_settings(&conn, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_default_settings() {
        let db = SqliteDb::open_in_memory().unwrap();
        let settings = db.get_forecast_settings().unwrap();
        assert_eq!(settings.hours_prior, 24);
        assert_eq!(settings.epochs, 1);
        assert_eq!(settings.load_col, "kw");
        assert_eq!(settings.temp_col, "tempc");
        assert_eq!(settings.hour_col, "hour");
        assert_eq!(settings.date_col, "date");
        assert_eq!(
            settings.earliest_sync_date,
            NaiveDate::from_ymd_opt(2016, 1, 1).unwrap()
        );
        assert_eq!(settings.min_historical_load, 24 * 365 * 3);
        assert_eq!(settings.min_forecast_weather, 24);
    }

    #[test]
    fn test_partial_settings_update() {
        let db = SqliteDb::open_in_memory().unwrap();
        let settings = db
            .update_forecast_settings(ForecastSettingsUpdate {
                epochs: Some(75),
                load_col: Some("KW".to_string()),
                min_historical_load: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(settings.epochs, 75);
        assert_eq!(settings.load_col, "kw");
        assert_eq!(settings.min_historical_load, 3);
        assert_eq!(settings.hours_prior, 24);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let db = SqliteDb::open_in_memory().unwrap();
        let result = db.update_forecast_settings(ForecastSettingsUpdate {
            hours_prior: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadcast.db");
        {
            let db = SqliteDb::new(&path).unwrap();
            db.update_forecast_settings(ForecastSettingsUpdate {
                hours_prior: Some(48),
                ..Default::default()
            })
            .unwrap();
        }

        let reopened = SqliteDb::new(&path).unwrap();
        assert_eq!(reopened.get_forecast_settings().unwrap().hours_prior, 48);
    }
}
