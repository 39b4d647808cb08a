//! Series commands: uploads, readiness and summaries

use crate::error::{AppError, Result};
use crate::services::{
    CommandFeed, IngestReport, RawTable, ReadinessEvaluator, ReadinessReport, SeriesKind, SeriesPoint,
    SeriesSummary, SyncService, UploadColumns, WeatherFeed,
};
use crate::state::AppState;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub series: SeriesKind,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub series: SeriesKind,
    pub deleted: usize,
}

/// Ingest an uploaded CSV file into a series
pub fn ingest_csv(state: &AppState, request: IngestRequest) -> Result<IngestReport> {
    tracing::info!("Ingesting {:?} into {}", request.path, request.series);

    let settings = state.settings()?;
    let table = RawTable::from_csv_path(&request.path)?;
    let columns = UploadColumns::for_series(&settings, request.series);

    state.store(request.series)?.ingest_table(&table, &columns)
}

/// Readiness of every store and the window a job would get
pub fn get_readiness(state: &AppState) -> Result<ReadinessReport> {
    let settings = state.settings()?;
    let stores = state.stores()?;
    ReadinessEvaluator::evaluate_report(
        &stores.historical_load,
        &stores.historical_weather,
        &stores.forecast_weather,
        settings.hours_prior,
    )
}

pub fn get_summary(state: &AppState, series: SeriesKind) -> Result<Option<SeriesSummary>> {
    state.store(series)?.summary()
}

pub fn export_series(state: &AppState, series: SeriesKind) -> Result<Vec<SeriesPoint>> {
    state.store(series)?.export()
}

pub fn clear_series(state: &AppState, series: SeriesKind) -> Result<ClearResponse> {
    let deleted = state.store(series)?.clear()?;
    Ok(ClearResponse { series, deleted })
}

/// Feed program from `LOADCAST_WEATHER_FEED`, bound to one series
pub fn configured_feed(state: &AppState, series: SeriesKind) -> Result<CommandFeed> {
    let program = state.config.weather_feed_program.clone().ok_or_else(|| {
        AppError::Config("LOADCAST_WEATHER_FEED is not set; no feed to sync from".to_string())
    })?;
    Ok(CommandFeed::new(
        program,
        state.config.weather_feed_args.clone(),
        series,
    ))
}

/// Pull new rows from a weather feed
pub async fn sync_weather(
    state: &AppState,
    series: SeriesKind,
    feed: &dyn WeatherFeed,
) -> Result<IngestReport> {
    let settings = state.settings()?;
    let store = state.store(series)?;
    SyncService::sync_series(
        &store,
        feed,
        settings.earliest_sync_date,
        Local::now().date_naive(),
    )
    .await
}
