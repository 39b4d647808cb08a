//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_forecast_jobs", CREATE_FORECAST_JOBS_TABLE)?;
    run_migration(conn, "002_forecast_settings", CREATE_FORECAST_SETTINGS_TABLE)?;
    run_migration(conn, "003_series_minimums", ADD_SERIES_MINIMUM_SETTINGS)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_FORECAST_JOBS_TABLE: &str = r#"
CREATE TABLE forecast_jobs (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    output_dir TEXT NOT NULL,
    epochs INTEGER NOT NULL,
    accuracy TEXT,
    forecast_values TEXT,
    artifact_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_forecast_jobs_created_at ON forecast_jobs(created_at);
"#;

const CREATE_FORECAST_SETTINGS_TABLE: &str = r#"
CREATE TABLE forecast_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    hours_prior INTEGER NOT NULL DEFAULT 24,
    epochs INTEGER NOT NULL DEFAULT 1,
    load_col TEXT NOT NULL DEFAULT 'kw',
    temp_col TEXT NOT NULL DEFAULT 'tempc',
    hour_col TEXT NOT NULL DEFAULT 'hour',
    date_col TEXT NOT NULL DEFAULT 'date',
    earliest_sync_date TEXT NOT NULL DEFAULT '2016-01-01',
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
INSERT INTO forecast_settings (id) VALUES (1);
"#;

const ADD_SERIES_MINIMUM_SETTINGS: &str = r#"
-- Non-null hours each series needs before a job can be created
ALTER TABLE forecast_settings ADD COLUMN min_historical_load INTEGER NOT NULL DEFAULT 26280;
ALTER TABLE forecast_settings ADD COLUMN min_historical_weather INTEGER NOT NULL DEFAULT 26280;
ALTER TABLE forecast_settings ADD COLUMN min_forecast_weather INTEGER NOT NULL DEFAULT 24;
"#;
