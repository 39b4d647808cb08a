//! DuckDB database module for hourly series data

pub mod models;
mod migrations;

use crate::error::Result;
use duckdb::Connection;
use models::{MergeCounts, SeriesRow, SeriesStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
}

impl DuckDb {
    /// Create new DuckDB connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
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

    /// All rows of a series in ascending time order
    pub fn query_series(&self, series: &str) -> Result<Vec<SeriesRow>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT ts, value
             FROM series_points
             WHERE series = ?
             ORDER BY ts ASC",
        )?;

        let rows = stmt
            .query_map(duckdb::params![series], |row| {
                Ok(SeriesRow {
                    ts: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Row count and time bounds over every stored hour, nulls included
    pub fn series_extent(&self, series: &str) -> Result<SeriesStats> {
        let conn = self.conn.lock();
        let stats = conn.query_row(
            "SELECT COUNT(*), MIN(ts), MAX(ts) FROM series_points WHERE series = ?",
            duckdb::params![series],
            |row| {
                Ok(SeriesStats {
                    count: row.get(0)?,
                    first_ts: row.get(1)?,
                    last_ts: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Row count and time bounds over non-null hours only
    pub fn series_value_extent(&self, series: &str) -> Result<SeriesStats> {
        let conn = self.conn.lock();
        let stats = conn.query_row(
            "SELECT COUNT(*), MIN(ts), MAX(ts)
             FROM series_points
             WHERE series = ? AND value IS NOT NULL",
            duckdb::params![series],
            |row| {
                Ok(SeriesStats {
                    count: row.get(0)?,
                    first_ts: row.get(1)?,
                    last_ts: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Merge hourly rows into a series in one transaction.
    ///
    /// Rows absent from the store are inserted. Rows already present are
    /// overwritten only when the incoming value is non-null. `gap_rows` are
    /// null placeholders that are inserted only where no row exists yet.
    pub fn merge_series_points(
        &self,
        series: &str,
        rows: &[SeriesRow],
        gap_rows: &[i64],
    ) -> Result<MergeCounts> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut counts = MergeCounts::default();

        let existing_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM series_points WHERE series = ?",
            duckdb::params![series],
            |row| row.get(0),
        )?;

        if existing_count == 0 {
            // Empty series: bulk insert without per-row lookups
            let mut insert = tx.prepare(
                "INSERT INTO series_points (series, ts, value) VALUES (?, ?, ?)",
            )?;
            for row in rows {
                insert.execute(duckdb::params![series, row.ts, row.value])?;
                counts.inserted += 1;
            }
            drop(insert);
            tx.commit()?;
            return Ok(counts);
        }

        let existing: HashMap<i64, Option<f64>> = {
            let mut stmt = tx.prepare("SELECT ts, value FROM series_points WHERE series = ?")?;
            let pairs = stmt
                .query_map(duckdb::params![series], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            pairs.into_iter().collect()
        };

        let mut insert =
            tx.prepare("INSERT INTO series_points (series, ts, value) VALUES (?, ?, ?)")?;
        let mut update =
            tx.prepare("UPDATE series_points SET value = ? WHERE series = ? AND ts = ?")?;

        for row in rows {
            if !existing.contains_key(&row.ts) {
                insert.execute(duckdb::params![series, row.ts, row.value])?;
                counts.inserted += 1;
            } else if let Some(value) = row.value {
                update.execute(duckdb::params![value, series, row.ts])?;
                counts.updated += 1;
            }
        }

        for &ts in gap_rows {
            if !existing.contains_key(&ts) {
                insert.execute(duckdb::params![series, ts, Option::<f64>::None])?;
                counts.gap_filled += 1;
            }
        }

        drop(insert);
        drop(update);
        tx.commit()?;

        Ok(counts)
    }

    /// Remove every row of a series
    pub fn clear_series(&self, series: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM series_points WHERE series = ?",
            duckdb::params![series],
        )?;
        Ok(deleted)
    }
}
