//! Forecast job registry

use crate::db::sqlite::models::{Accuracy, ForecastJob};
use crate::error::{AppError, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};

const JOB_COLUMNS: &str = "id, created_at, start_date, end_date, output_dir, epochs, accuracy, forecast_values, artifact_path";

fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<ForecastJob> {
    Ok(ForecastJob {
        id: row.get(0)?,
        created_at: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        output_dir: PathBuf::from(row.get::<_, String>(4)?),
        epochs: row.get(5)?,
        accuracy: json_column::<Accuracy>(row, 6)?,
        forecast_values: json_column::<Vec<f64>>(row, 7)?,
        artifact_path: row.get::<_, Option<String>>(8)?.map(PathBuf::from),
    })
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Insert a newly created job
pub fn insert_job(conn: &Connection, job: &ForecastJob) -> Result<()> {
    let accuracy = job.accuracy.map(|a| serde_json::to_string(&a)).transpose()?;
    let forecast = job
        .forecast_values
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO forecast_jobs (id, created_at, start_date, end_date, output_dir, epochs, accuracy, forecast_values, artifact_path)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            job.id,
            job.created_at,
            job.start_date,
            job.end_date,
            path_text(&job.output_dir),
            job.epochs,
            accuracy,
            forecast,
            job.artifact_path.as_deref().map(path_text),
        ],
    )?;

    Ok(())
}

/// Get job by id
pub fn get_job(conn: &Connection, id: &str) -> Result<ForecastJob> {
    let sql = format!("SELECT {} FROM forecast_jobs WHERE id = ?", JOB_COLUMNS);
    conn.query_row(&sql, [id], row_to_job).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Forecast job not found: {}", id))
        }
        _ => e.into(),
    })
}

/// All jobs, newest first
pub fn list_jobs(conn: &Connection) -> Result<Vec<ForecastJob>> {
    let sql = format!(
        "SELECT {} FROM forecast_jobs ORDER BY created_at DESC, id DESC",
        JOB_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map([], row_to_job)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(jobs)
}

/// Record the trainer's output for a finished job
pub fn record_job_result(
    conn: &Connection,
    id: &str,
    accuracy: Accuracy,
    forecast_values: &[f64],
    artifact_path: Option<&Path>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE forecast_jobs SET accuracy = ?, forecast_values = ?, artifact_path = COALESCE(?, artifact_path)
         WHERE id = ?",
        rusqlite::params![
            serde_json::to_string(&accuracy)?,
            serde_json::to_string(forecast_values)?,
            artifact_path.map(path_text),
            id,
        ],
    )?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Forecast job not found: {}", id)));
    }
    Ok(())
}
