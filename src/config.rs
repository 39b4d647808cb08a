//! Runtime configuration
//!
//! Paths and the trainer command come from the environment. Forecast
//! parameters that operators tune at runtime (horizon, epochs, upload column
//! names) live in the SQLite `forecast_settings` row instead.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default trainer executable looked up on `PATH`
pub const DEFAULT_TRAINER: &str = "loadcast-trainer";

/// Process-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding both databases
    pub data_dir: PathBuf,
    /// Root under which every job gets its own directory
    pub output_dir: PathBuf,
    /// Trainer program
    pub trainer_program: String,
    /// Extra arguments placed before `<snapshot> <epochs>`
    pub trainer_args: Vec<String>,
    /// Weather feed program used by `sync`, if any
    pub weather_feed_program: Option<String>,
    /// Extra arguments placed before `<series> <start> <end>`
    pub weather_feed_args: Vec<String>,
}

impl AppConfig {
    /// Load configuration from `LOADCAST_*` environment variables
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("LOADCAST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let output_dir = env::var("LOADCAST_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("output"));

        let trainer_program =
            env::var("LOADCAST_TRAINER").unwrap_or_else(|_| DEFAULT_TRAINER.to_string());
        if trainer_program.trim().is_empty() {
            return Err(AppError::Config("LOADCAST_TRAINER is empty".to_string()));
        }

        let trainer_args = env::var("LOADCAST_TRAINER_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let weather_feed_program = env::var("LOADCAST_WEATHER_FEED")
            .ok()
            .filter(|program| !program.trim().is_empty());

        let weather_feed_args = env::var("LOADCAST_WEATHER_FEED_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            output_dir,
            trainer_program,
            trainer_args,
            weather_feed_program,
            weather_feed_args,
        })
    }

    /// Configuration rooted at an explicit directory (used by tests and embedders)
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            output_dir: data_dir.join("output"),
            data_dir,
            trainer_program: DEFAULT_TRAINER.to_string(),
            trainer_args: Vec::new(),
            weather_feed_program: None,
            weather_feed_args: Vec::new(),
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("loadcast.db")
    }

    pub fn duckdb_path(&self) -> PathBuf {
        self.data_dir.join("series.duckdb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_data_dir_derives_paths() {
        let config = AppConfig::with_data_dir("/tmp/loadcast");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/loadcast/output"));
        assert_eq!(config.sqlite_path(), PathBuf::from("/tmp/loadcast/loadcast.db"));
        assert_eq!(config.duckdb_path(), PathBuf::from("/tmp/loadcast/series.duckdb"));
        assert_eq!(config.trainer_program, DEFAULT_TRAINER);
        assert_eq!(config.weather_feed_program, None);
    }
}
