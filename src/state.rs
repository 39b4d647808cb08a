//! Application state management

use crate::config::AppConfig;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::{ForecastSettings, SqliteDb};
use crate::error::Result;
use crate::jobs::{JobOrchestrator, TrainerEntrypoint};
use crate::services::{SeriesKind, SeriesStores, TimeSeriesStore};
use std::sync::Arc;

/// Application state shared across all commands
pub struct AppState {
    /// SQLite database: job registry and forecast settings
    pub sqlite: Arc<SqliteDb>,

    /// DuckDB connection for the hourly series
    pub duckdb: Arc<DuckDb>,

    pub config: AppConfig,

    pub orchestrator: JobOrchestrator,
}

impl AppState {
    /// Open both databases under the configured data directory
    pub fn new(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.output_dir)?;

        tracing::info!("Data directory: {:?}", config.data_dir);

        let sqlite = Arc::new(SqliteDb::new(&config.sqlite_path())?);
        let duckdb = Arc::new(DuckDb::new(&config.duckdb_path())?);

        Ok(Self::from_parts(config, sqlite, duckdb))
    }

    /// State over already-open databases
    pub fn from_parts(config: AppConfig, sqlite: Arc<SqliteDb>, duckdb: Arc<DuckDb>) -> Self {
        let orchestrator = JobOrchestrator::new(
            sqlite.clone(),
            config.output_dir.clone(),
            TrainerEntrypoint::from_config(&config),
        );

        Self {
            sqlite,
            duckdb,
            config,
            orchestrator,
        }
    }

    pub fn settings(&self) -> Result<ForecastSettings> {
        self.sqlite.get_forecast_settings()
    }

    /// Stores with thresholds from the current settings
    pub fn stores(&self) -> Result<SeriesStores> {
        let settings = self.settings()?;
        Ok(SeriesStores::new(self.duckdb.clone(), &settings))
    }

    pub fn store(&self, kind: SeriesKind) -> Result<TimeSeriesStore> {
        let settings = self.settings()?;
        Ok(TimeSeriesStore::new(
            self.duckdb.clone(),
            kind,
            settings.minimum_for(kind),
        ))
    }
}
