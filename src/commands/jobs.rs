//! Forecast job commands

use crate::db::sqlite::ForecastJob;
use crate::error::{AppError, Result};
use crate::jobs::{JobOverview, JobState};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobState,
    pub pid: Option<u32>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub job_id: String,
    pub state: JobState,
    pub error: Option<String>,
    pub job: ForecastJob,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub reconciled: Vec<String>,
}

/// Create a job from the current stores
pub fn create_job(state: &AppState) -> Result<ForecastJob> {
    let settings = state.settings()?;
    let stores = state.stores()?;
    state.orchestrator.create(&stores, &settings)
}

/// Launch a job and wait for the trainer to finish
pub async fn launch_job(state: &AppState, job_id: &str) -> Result<LaunchResponse> {
    let job = state.orchestrator.get_job(job_id)?;
    let completion = state.orchestrator.launch(&job)?;

    let (final_state, error) = match completion.wait().await {
        Ok(final_state) => (final_state, None),
        Err(AppError::JobFailure(message)) => (JobState::Failure, Some(message)),
        Err(e) => return Err(e),
    };

    Ok(LaunchResponse {
        job_id: job.id.clone(),
        state: final_state,
        error,
        job: state.orchestrator.get_job(job_id)?,
    })
}

pub fn get_job_status(state: &AppState, job_id: &str) -> Result<JobStatusResponse> {
    let record = state.orchestrator.status_record(job_id)?;
    Ok(match record {
        Some(record) => JobStatusResponse {
            job_id: job_id.to_string(),
            state: record.state,
            pid: record.pid,
            error: record.error,
            updated_at: Some(record.updated_at),
        },
        None => JobStatusResponse {
            job_id: job_id.to_string(),
            state: JobState::NotStarted,
            pid: None,
            error: None,
            updated_at: None,
        },
    })
}

pub fn cancel_job(state: &AppState, job_id: &str) -> Result<JobStatusResponse> {
    state.orchestrator.cancel(job_id)?;
    get_job_status(state, job_id)
}

pub fn list_jobs(state: &AppState) -> Result<Vec<JobOverview>> {
    state.orchestrator.overview()
}

/// Newest completed forecast
pub fn latest_forecast(state: &AppState) -> Result<Option<ForecastJob>> {
    state.orchestrator.latest_successful()
}

pub fn reconcile_jobs(state: &AppState) -> Result<ReconcileResponse> {
    let reconciled = state.orchestrator.reconcile_orphans()?;
    Ok(ReconcileResponse { reconciled })
}
