//! Persistence: DuckDB for hourly series, SQLite for jobs and settings

pub mod duckdb;
pub mod sqlite;
