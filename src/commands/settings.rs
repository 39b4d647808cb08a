//! Forecast settings commands

use crate::db::sqlite::{ForecastSettings, ForecastSettingsUpdate};
use crate::error::{AppError, Result};
use crate::state::AppState;
use chrono::NaiveDate;

/// Get current forecast settings
pub fn get_settings(state: &AppState) -> Result<ForecastSettings> {
    state.sqlite.get_forecast_settings()
}

/// Update forecast settings
pub fn update_settings(state: &AppState, update: ForecastSettingsUpdate) -> Result<ForecastSettings> {
    tracing::info!("Updating forecast settings");
    state.sqlite.update_forecast_settings(update)
}

/// Build a one-field update from a `key value` pair
pub fn parse_setting(key: &str, value: &str) -> Result<ForecastSettingsUpdate> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .parse()
            .map_err(|_| AppError::Validation(format!("{} must be a number, got {:?}", key, value)))
    }

    let mut update = ForecastSettingsUpdate::default();
    match key {
        "hours_prior" => update.hours_prior = Some(number(key, value)?),
        "epochs" => update.epochs = Some(number(key, value)?),
        "load_col" => update.load_col = Some(value.to_string()),
        "temp_col" => update.temp_col = Some(value.to_string()),
        "hour_col" => update.hour_col = Some(value.to_string()),
        "date_col" => update.date_col = Some(value.to_string()),
        "earliest_sync_date" => {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                AppError::Validation(format!("earliest_sync_date must be YYYY-MM-DD, got {:?}", value))
            })?;
            update.earliest_sync_date = Some(date);
        }
        "min_historical_load" => update.min_historical_load = Some(number(key, value)?),
        "min_historical_weather" => update.min_historical_weather = Some(number(key, value)?),
        "min_forecast_weather" => update.min_forecast_weather = Some(number(key, value)?),
        other => return Err(AppError::Validation(format!("Unknown setting: {}", other))),
    }
    Ok(update)
}
