//! Forecast settings management

use crate::db::sqlite::models::{ForecastSettings, ForecastSettingsUpdate};
use crate::error::{AppError, Result};
use rusqlite::Connection;

/// Get forecast settings
pub fn get_forecast_settings(conn: &Connection) -> Result<ForecastSettings> {
    let settings = conn.query_row(
        "SELECT hours_prior, epochs, load_col, temp_col, hour_col, date_col, earliest_sync_date,
                min_historical_load, min_historical_weather, min_forecast_weather
         FROM forecast_settings WHERE id = 1",
        [],
        |row| {
            Ok(ForecastSettings {
                hours_prior: row.get(0)?,
                epochs: row.get(1)?,
                load_col: row.get(2)?,
                temp_col: row.get(3)?,
                hour_col: row.get(4)?,
                date_col: row.get(5)?,
                earliest_sync_date: row.get(6)?,
                min_historical_load: row.get::<_, i64>(7)? as usize,
                min_historical_weather: row.get::<_, i64>(8)? as usize,
                min_forecast_weather: row.get::<_, i64>(9)? as usize,
            })
        },
    )?;

    Ok(settings)
}

/// Update forecast settings; `None` fields keep their stored value
pub fn update_forecast_settings(
    conn: &Connection,
    update: ForecastSettingsUpdate,
) -> Result<ForecastSettings> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(h) = update.hours_prior {
        if h == 0 {
            return Err(AppError::Validation("hours_prior must be positive".to_string()));
        }
        updates.push("hours_prior = ?");
        params.push(Box::new(h));
    }
    if let Some(e) = update.epochs {
        updates.push("epochs = ?");
        params.push(Box::new(e));
    }
    if let Some(c) = update.load_col {
        updates.push("load_col = ?");
        params.push(Box::new(c.to_lowercase()));
    }
    if let Some(c) = update.temp_col {
        updates.push("temp_col = ?");
        params.push(Box::new(c.to_lowercase()));
    }
    if let Some(c) = update.hour_col {
        updates.push("hour_col = ?");
        params.push(Box::new(c.to_lowercase()));
    }
    if let Some(c) = update.date_col {
        updates.push("date_col = ?");
        params.push(Box::new(c.to_lowercase()));
    }
    if let Some(d) = update.earliest_sync_date {
        updates.push("earliest_sync_date = ?");
        params.push(Box::new(d));
    }
    if let Some(m) = update.min_historical_load {
        updates.push("min_historical_load = ?");
        params.push(Box::new(m as i64));
    }
    if let Some(m) = update.min_historical_weather {
        updates.push("min_historical_weather = ?");
        params.push(Box::new(m as i64));
    }
    if let Some(m) = update.min_forecast_weather {
        updates.push("min_forecast_weather = ?");
        params.push(Box::new(m as i64));
    }

    if !updates.is_empty() {
        updates.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE forecast_settings SET {} WHERE id = 1",
            updates.join(", ")
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_forecast_settings(conn)
}
