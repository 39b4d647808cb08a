//! Loadcast - hourly load forecasting core
//!
//! Ingests hourly load and temperature series, decides when enough history
//! exists to forecast, and runs model training as a cancellable external
//! job whose state survives host restarts.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod services;
pub mod state;

use commands::Command;
use config::AppConfig;
use state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Logs go to stderr.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadcast=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the command given on the command line and print its JSON result
pub fn run() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let state = AppState::new(config)?;

    if command.reconciles_on_start() {
        let reconciled = state.orchestrator.reconcile_orphans()?;
        if !reconciled.is_empty() {
            tracing::warn!("Settled {} unsupervised job(s): {:?}", reconciled.len(), reconciled);
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(commands::dispatch(&state, command))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
