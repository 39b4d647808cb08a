//! Durable job status handle
//!
//! `status.json` inside the job directory is the only place a job's state
//! lives. Writes go to a temporary file first and are renamed into place so
//! a reader never sees a half-written record.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const STATUS_FILE: &str = "status.json";
const STATUS_TMP_FILE: &str = "status.json.tmp";

/// Lifecycle state of a forecast job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    NotStarted,
    Running,
    Completed,
    Failure,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotStarted => "NOT STARTED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failure)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of the status handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub state: JobState,
    /// Trainer process id, also its process group id
    pub pid: Option<u32>,
    /// Host process supervising the trainer
    #[serde(default)]
    pub host_pid: Option<u32>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    /// RUNNING, supervised by the current process
    pub fn running(pid: Option<u32>) -> Self {
        Self {
            state: JobState::Running,
            pid,
            host_pid: Some(std::process::id()),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn completed(pid: Option<u32>) -> Self {
        Self {
            state: JobState::Completed,
            pid,
            host_pid: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn failure(pid: Option<u32>, error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failure,
            pid,
            host_pid: None,
            error: Some(error.into()),
            updated_at: Utc::now(),
        }
    }

    /// Same record attributed to another supervising host
    pub fn with_host(mut self, host_pid: Option<u32>) -> Self {
        self.host_pid = host_pid;
        self
    }
}

/// Handle on a job directory's `status.json`
#[derive(Debug, Clone)]
pub struct StatusHandle {
    dir: PathBuf,
}

impl StatusHandle {
    pub fn new(job_dir: &Path) -> Self {
        Self {
            dir: job_dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    /// Current record, `None` if the job was never launched
    pub fn read(&self) -> Result<Option<StatusRecord>> {
        match fs::read(self.path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn state(&self) -> Result<JobState> {
        Ok(self
            .read()?
            .map(|record| record.state)
            .unwrap_or(JobState::NotStarted))
    }

    pub fn write(&self, record: &StatusRecord) -> Result<()> {
        let tmp = self.dir.join(STATUS_TMP_FILE);
        let bytes = serde_json::to_vec_pretty(record)?;

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, self.path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_handle_means_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let handle = StatusHandle::new(dir.path());
        assert_eq!(handle.read().unwrap(), None);
        assert_eq!(handle.state().unwrap(), JobState::NotStarted);
    }

    #[test]
    fn test_write_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let handle = StatusHandle::new(dir.path());

        handle.write(&StatusRecord::running(Some(42))).unwrap();
        assert_eq!(handle.state().unwrap(), JobState::Running);
        assert_eq!(handle.read().unwrap().unwrap().host_pid, Some(std::process::id()));

        handle.write(&StatusRecord::failure(Some(42), "cancelled")).unwrap();
        let record = handle.read().unwrap().unwrap();
        assert_eq!(record.state, JobState::Failure);
        assert_eq!(record.pid, Some(42));
        assert_eq!(record.error.as_deref(), Some("cancelled"));
        assert!(!dir.path().join(STATUS_TMP_FILE).exists());
    }

    #[test]
    fn test_record_without_host_pid_still_reads() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(STATUS_FILE),
            r#"{"state":"RUNNING","pid":7,"error":null,"updated_at":"2022-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let record = StatusHandle::new(dir.path()).read().unwrap().unwrap();
        assert_eq!(record.state, JobState::Running);
        assert_eq!(record.host_pid, None);
    }

    #[test]
    fn test_state_serialises_in_upper_case() {
        let json = serde_json::to_string(&JobState::NotStarted).unwrap();
        assert_eq!(json, "\"NOT_STARTED\"");
        assert_eq!(JobState::NotStarted.to_string(), "NOT STARTED");
        assert!(JobState::Failure.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }
}
