//! Trainer supervision
//!
//! One Tokio task per launched job owns the child process, waits for it (or
//! for a kill request) and writes the terminal state.

use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use crate::jobs::process;
use crate::jobs::status::{JobState, StatusHandle, StatusRecord};
use crate::jobs::trainer::TrainerResult;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Kill switches of the jobs supervised by this process
pub(crate) type KillSwitches = Arc<DashMap<String, oneshot::Sender<()>>>;

/// Resolves once a launched job reaches a terminal state.
///
/// A worker failure surfaces here as `AppError::JobFailure`, never from
/// `launch` itself.
pub struct JobCompletion {
    job_id: String,
    handle: JoinHandle<Result<JobState>>,
}

impl JobCompletion {
    pub(crate) fn new(job_id: String, handle: JoinHandle<Result<JobState>>) -> Self {
        Self { job_id, handle }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<JobState> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Internal(format!(
                "supervisor for job {} stopped: {}",
                self.job_id, e
            ))),
        }
    }
}

pub(crate) struct SupervisorContext {
    pub job_id: String,
    pub pid: Option<u32>,
    pub status: StatusHandle,
    pub result_path: PathBuf,
    pub default_artifact: PathBuf,
    pub sqlite: Arc<SqliteDb>,
    pub terminal_lock: Arc<Mutex<()>>,
    pub kill_switches: KillSwitches,
}

enum WorkerExit {
    Exited(std::io::Result<ExitStatus>),
    Killed,
}

pub(crate) async fn supervise(
    ctx: SupervisorContext,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
) -> Result<JobState> {
    let exit = tokio::select! {
        status = child.wait() => WorkerExit::Exited(status),
        Ok(()) = kill_rx => {
            let killed = match ctx.pid {
                Some(pid) => process::kill_tree(pid).unwrap_or(false),
                None => false,
            };
            if !killed {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill trainer for job {}: {}", ctx.job_id, e);
                }
            }
            let _ = child.wait().await;
            WorkerExit::Killed
        }
    };

    finish(&ctx, exit)
}

/// Write the terminal state unless a cancel already did
fn finish(ctx: &SupervisorContext, exit: WorkerExit) -> Result<JobState> {
    let _guard = ctx.terminal_lock.lock();
    ctx.kill_switches.remove(&ctx.job_id);

    if let Some(record) = ctx.status.read()? {
        if record.state == JobState::Failure {
            return Err(AppError::JobFailure(
                record.error.unwrap_or_else(|| "job failed".to_string()),
            ));
        }
        if record.state.is_terminal() {
            return Ok(record.state);
        }
    }

    let outcome = match exit {
        WorkerExit::Exited(Ok(status)) if status.success() => record_result(
            &ctx.sqlite,
            &ctx.job_id,
            &ctx.result_path,
            &ctx.default_artifact,
        ),
        WorkerExit::Exited(Ok(status)) => {
            Err(AppError::JobFailure(format!("trainer exited with {}", status)))
        }
        WorkerExit::Exited(Err(e)) => {
            Err(AppError::JobFailure(format!("lost track of trainer: {}", e)))
        }
        WorkerExit::Killed => Err(AppError::JobFailure("cancelled".to_string())),
    };

    match outcome {
        Ok(()) => {
            ctx.status.write(&StatusRecord::completed(ctx.pid))?;
            info!("Forecast job {} completed", ctx.job_id);
            Ok(JobState::Completed)
        }
        Err(e) => {
            let message = match e {
                AppError::JobFailure(message) => message,
                other => other.to_string(),
            };
            error!("Forecast job {} failed: {}", ctx.job_id, message);
            ctx.status.write(&StatusRecord::failure(ctx.pid, message.clone()))?;
            Err(AppError::JobFailure(message))
        }
    }
}

/// Copy a trainer's result file into the job record
pub(crate) fn record_result(
    sqlite: &SqliteDb,
    job_id: &str,
    result_path: &Path,
    default_artifact: &Path,
) -> Result<()> {
    let result = TrainerResult::read(result_path)?;
    let artifact = result
        .artifact_path
        .clone()
        .or_else(|| default_artifact.exists().then(|| default_artifact.to_path_buf()));

    sqlite.record_job_result(
        job_id,
        result.accuracy,
        &result.forecast,
        artifact.as_deref(),
    )
}
