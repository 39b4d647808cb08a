//! Commands
//!
//! Every operation the `loadcast` binary exposes. Each command returns a
//! serialisable result that the binary prints as JSON.

pub mod jobs;
pub mod series;
pub mod settings;

use crate::error::{AppError, Result};
use crate::services::SeriesKind;
use crate::state::AppState;
use serde_json::Value;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: loadcast <command> [args]

Commands:
  ingest <series> <csv>     Upload hourly rows into a series
  export <series>           Print every stored hour of a series
  summary <series>          Row count, range and missing values of a series
  clear <series>            Delete every row of a series
  sync <series>             Pull new rows from $LOADCAST_WEATHER_FEED
  readiness                 Readiness of each series and the forecast window
  create                    Create a forecast job
  launch <job>              Run the trainer for a job and wait for it
  status <job>              Current state of a job
  cancel <job>              Kill a running job
  jobs                      All jobs, newest first
  latest                    Newest completed forecast
  reconcile                 Fail jobs whose trainer died with a previous host
  settings                  Show forecast settings
  settings set <key> <val>  Change one forecast setting

Series: historical_load, historical_weather, forecast_weather";

/// Parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ingest { series: SeriesKind, path: PathBuf },
    Export { series: SeriesKind },
    Summary { series: SeriesKind },
    Clear { series: SeriesKind },
    Sync { series: SeriesKind },
    Readiness,
    Create,
    Launch { job_id: String },
    Status { job_id: String },
    Cancel { job_id: String },
    Jobs,
    Latest,
    Reconcile,
    Settings,
    SetSetting { key: String, value: String },
    Help,
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| AppError::Validation(format!("missing <{}>\n\n{}", name, USAGE)))
}

impl Command {
    /// Parse arguments, program name excluded
    pub fn parse(args: &[String]) -> Result<Self> {
        let cmd = args.first().map(String::as_str).unwrap_or("help");
        let series = || -> Result<SeriesKind> { arg(args, 1, "series")?.parse() };
        let job_id = || -> Result<String> { Ok(arg(args, 1, "job")?.to_string()) };

        let command = match cmd {
            "ingest" => Command::Ingest {
                series: series()?,
                path: PathBuf::from(arg(args, 2, "csv")?),
            },
            "export" => Command::Export { series: series()? },
            "summary" => Command::Summary { series: series()? },
            "clear" => Command::Clear { series: series()? },
            "sync" => Command::Sync { series: series()? },
            "readiness" => Command::Readiness,
            "create" => Command::Create,
            "launch" => Command::Launch { job_id: job_id()? },
            "status" => Command::Status { job_id: job_id()? },
            "cancel" => Command::Cancel { job_id: job_id()? },
            "jobs" => Command::Jobs,
            "latest" => Command::Latest,
            "reconcile" => Command::Reconcile,
            "settings" => match args.get(1).map(String::as_str) {
                None => Command::Settings,
                Some("set") => Command::SetSetting {
                    key: arg(args, 2, "key")?.to_string(),
                    value: arg(args, 3, "value")?.to_string(),
                },
                Some(other) => {
                    return Err(AppError::Validation(format!(
                        "Unknown settings subcommand: {}",
                        other
                    )))
                }
            },
            "help" | "-h" | "--help" => Command::Help,
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown command: {}\n\n{}",
                    other, USAGE
                )))
            }
        };

        Ok(command)
    }

    /// Orphaned jobs are reconciled before every command except these
    pub fn reconciles_on_start(&self) -> bool {
        !matches!(self, Command::Help | Command::Reconcile)
    }
}

/// Run a command against the application state
pub async fn dispatch(state: &AppState, command: Command) -> Result<Value> {
    let value = match command {
        Command::Ingest { series: kind, path } => {
            let request = series::IngestRequest { series: kind, path };
            serde_json::to_value(series::ingest_csv(state, request)?)?
        }
        Command::Export { series: kind } => serde_json::to_value(series::export_series(state, kind)?)?,
        Command::Summary { series: kind } => serde_json::to_value(series::get_summary(state, kind)?)?,
        Command::Clear { series: kind } => serde_json::to_value(series::clear_series(state, kind)?)?,
        Command::Sync { series: kind } => {
            let feed = series::configured_feed(state, kind)?;
            serde_json::to_value(series::sync_weather(state, kind, &feed).await?)?
        }
        Command::Readiness => serde_json::to_value(series::get_readiness(state)?)?,
        Command::Create => serde_json::to_value(jobs::create_job(state)?)?,
        Command::Launch { job_id } => serde_json::to_value(jobs::launch_job(state, &job_id).await?)?,
        Command::Status { job_id } => serde_json::to_value(jobs::get_job_status(state, &job_id)?)?,
        Command::Cancel { job_id } => serde_json::to_value(jobs::cancel_job(state, &job_id)?)?,
        Command::Jobs => serde_json::to_value(jobs::list_jobs(state)?)?,
        Command::Latest => serde_json::to_value(jobs::latest_forecast(state)?)?,
        Command::Reconcile => serde_json::to_value(jobs::reconcile_jobs(state)?)?,
        Command::Settings => serde_json::to_value(settings::get_settings(state)?)?,
        Command::SetSetting { key, value } => {
            let update = settings::parse_setting(&key, &value)?;
            serde_json::to_value(settings::update_settings(state, update)?)?
        }
        Command::Help => Value::String(USAGE.to_string()),
    };
    Ok(value)
}
