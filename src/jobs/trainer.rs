//! Trainer process boundary
//!
//! The trainer is an external program. It is started with its configured
//! arguments followed by `<snapshot_path> <epochs>` and reports back through
//! a JSON result file.

use crate::config::AppConfig;
use crate::db::sqlite::Accuracy;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const RESULT_FILE: &str = "trainer-result.json";
pub const LOG_FILE: &str = "trainer.log";

/// Program and leading arguments used to start the trainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerEntrypoint {
    pub program: String,
    pub args: Vec<String>,
}

/// Everything one trainer run needs to know
#[derive(Debug, Clone)]
pub struct TrainerInvocation {
    pub job_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub epochs: u32,
    pub artifact_path: PathBuf,
    pub result_path: PathBuf,
    pub hours_prior: u32,
}

/// What a successful trainer writes to its result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerResult {
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
    pub accuracy: Accuracy,
    pub forecast: Vec<f64>,
}

impl TrainerEntrypoint {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.trainer_program.clone(), config.trainer_args.clone())
    }

    /// Command for one run; stdout and stderr go to the job's log file
    pub fn command(&self, invocation: &TrainerInvocation) -> Result<Command> {
        let log = fs::File::create(invocation.job_dir.join(LOG_FILE))?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&invocation.snapshot_path)
            .arg(invocation.epochs.to_string())
            .env("LOADCAST_SNAPSHOT", &invocation.snapshot_path)
            .env("LOADCAST_EPOCHS", invocation.epochs.to_string())
            .env("LOADCAST_ARTIFACT", &invocation.artifact_path)
            .env("LOADCAST_RESULT", &invocation.result_path)
            .env("LOADCAST_HOURS_PRIOR", invocation.hours_prior.to_string())
            .current_dir(&invocation.job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        // Own process group, so a cancel can kill everything the trainer spawns
        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }
}

impl TrainerResult {
    /// Read the result file left by a trainer that exited cleanly
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::JobFailure(
                    "trainer exited without writing a result".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::JobFailure(format!("invalid trainer result: {}", e)))
    }
}
