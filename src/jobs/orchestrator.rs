//! Job Orchestrator
//!
//! Creates forecast jobs from ready stores, launches the trainer as a child
//! process and cancels it. Job state is read back from each job's status
//! handle, so a fresh orchestrator over the same directories sees exactly
//! what the one that launched the job sees.

use crate::db::sqlite::{ForecastJob, ForecastSettings, SqliteDb};
use crate::error::{AppError, Result};
use crate::jobs::process;
use crate::jobs::status::{JobState, StatusHandle, StatusRecord};
use crate::jobs::supervisor::{self, JobCompletion, KillSwitches, SupervisorContext};
use crate::jobs::trainer::{TrainerEntrypoint, TrainerInvocation, RESULT_FILE};
use crate::services::{ReadinessEvaluator, SeriesStores, SnapshotBuilder, SnapshotTable, SNAPSHOT_FILE};
use chrono::{Local, NaiveDateTime};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

const SLUG_FORMAT: &str = "%Y-%m-%d.%H-%M-%S";
const ORPHAN_MESSAGE: &str = "worker exited while host was down";
const CANCEL_MESSAGE: &str = "cancelled";

/// A job together with its current state
#[derive(Debug, Clone, Serialize)]
pub struct JobOverview {
    #[serde(flatten)]
    pub job: ForecastJob,
    pub status: JobState,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct JobOrchestrator {
    sqlite: Arc<SqliteDb>,
    output_dir: PathBuf,
    trainer: TrainerEntrypoint,
    kill_switches: KillSwitches,
    terminal_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl JobOrchestrator {
    pub fn new(sqlite: Arc<SqliteDb>, output_dir: PathBuf, trainer: TrainerEntrypoint) -> Self {
        Self {
            sqlite,
            output_dir,
            trainer,
            kill_switches: Arc::new(DashMap::new()),
            terminal_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id)
    }

    fn existing_job_dir(&self, job_id: &str) -> Result<PathBuf> {
        if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id.contains("..") {
            return Err(AppError::Validation(format!("Invalid job id: {}", job_id)));
        }
        let dir = self.job_dir(job_id);
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!("Forecast job not found: {}", job_id)));
        }
        Ok(dir)
    }

    fn terminal_lock(&self, job_id: &str) -> Arc<Mutex<()>> {
        self.terminal_locks
            .entry(job_id.to_string())
            .or_default()
            .clone()
    }

    /// Create a job for the current readiness window.
    ///
    /// Writes the snapshot into a fresh job directory and records the job.
    pub fn create(&self, stores: &SeriesStores, settings: &ForecastSettings) -> Result<ForecastJob> {
        let window = ReadinessEvaluator::evaluate(
            &stores.historical_load,
            &stores.historical_weather,
            &stores.forecast_weather,
            settings.hours_prior,
        )?
        .ok_or_else(|| {
            AppError::Precondition(
                "not enough historical and forecast data to create a forecast".to_string(),
            )
        })?;

        let created_at = Local::now().naive_local();
        let (id, job_dir) = self.allocate_job_dir(created_at)?;

        let job = ForecastJob {
            id,
            created_at,
            start_date: window.start_date,
            end_date: window.end_date,
            output_dir: job_dir.clone(),
            epochs: settings.epochs,
            accuracy: None,
            forecast_values: None,
            artifact_path: None,
        };

        let persisted = SnapshotBuilder::build(
            &stores.historical_load,
            &stores.historical_weather,
            &stores.forecast_weather,
            &window,
        )
        .and_then(|table| {
            if table.forecast_rows().next().is_none() {
                warn!("Snapshot for job {} has no forecast hours", job.id);
            }
            table.write_csv(&job_dir.join(SNAPSHOT_FILE))
        })
        .and_then(|_| self.sqlite.insert_job(&job));

        if let Err(e) = persisted {
            let _ = fs::remove_dir_all(&job_dir);
            return Err(e);
        }

        info!(
            "Created forecast job {} for {} .. {}",
            job.id, job.start_date, job.end_date
        );
        Ok(job)
    }

    /// Exclusive directory named after the creation instant
    fn allocate_job_dir(&self, created_at: NaiveDateTime) -> Result<(String, PathBuf)> {
        fs::create_dir_all(&self.output_dir)?;

        let slug = created_at.format(SLUG_FORMAT).to_string();
        let mut id = slug.clone();
        loop {
            let dir = self.job_dir(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let suffix = uuid::Uuid::new_v4().simple().to_string();
                    id = format!("{}-{}", slug, &suffix[..8]);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Start the trainer for `job`.
    ///
    /// The status handle says RUNNING, with the child's pid, before this
    /// returns. Must be called from within a Tokio runtime.
    pub fn launch(&self, job: &ForecastJob) -> Result<JobCompletion> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Internal(format!("launch needs a Tokio runtime: {}", e)))?;

        let job_dir = self.existing_job_dir(&job.id)?;
        let lock = self.terminal_lock(&job.id);
        let _guard = lock.lock();

        let status = StatusHandle::new(&job_dir);
        if let Some(record) = status.read()? {
            return Err(AppError::InvalidState(format!(
                "Job {} was already launched ({})",
                job.id, record.state
            )));
        }

        let hours_prior = ((job.end_date - job.start_date).num_hours() + 1).max(0) as u32;
        let invocation = TrainerInvocation {
            job_dir: job_dir.clone(),
            snapshot_path: job_dir.join(SNAPSHOT_FILE),
            epochs: job.epochs,
            artifact_path: artifact_path(&job_dir, &job.id),
            result_path: job_dir.join(RESULT_FILE),
            hours_prior,
        };

        let spawned = self
            .trainer
            .command(&invocation)
            .and_then(|mut cmd| cmd.spawn().map_err(AppError::from));

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to start trainer {}: {}", self.trainer.program, e);
                warn!("Forecast job {}: {}", job.id, message);
                status.write(&StatusRecord::failure(None, message.clone()))?;
                let handle = runtime.spawn(async move { Err(AppError::JobFailure(message)) });
                return Ok(JobCompletion::new(job.id.clone(), handle));
            }
        };

        let pid = child.id();
        if let Err(e) = status.write(&StatusRecord::running(pid)) {
            let killed = pid.map(|pid| process::kill_tree(pid).unwrap_or(false)).unwrap_or(false);
            if !killed {
                if let Err(kill_err) = child.start_kill() {
                    warn!("Failed to kill trainer for job {}: {}", job.id, kill_err);
                }
            }
            // Reap the child so it does not linger as a zombie
            runtime.spawn(async move {
                let _ = child.wait().await;
            });
            return Err(e);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        self.kill_switches.insert(job.id.clone(), kill_tx);

        let ctx = SupervisorContext {
            job_id: job.id.clone(),
            pid,
            status,
            result_path: invocation.result_path,
            default_artifact: invocation.artifact_path,
            sqlite: self.sqlite.clone(),
            terminal_lock: lock.clone(),
            kill_switches: self.kill_switches.clone(),
        };
        let handle = runtime.spawn(supervisor::supervise(ctx, child, kill_rx));

        info!("Launched forecast job {} (pid {:?})", job.id, pid);
        Ok(JobCompletion::new(job.id.clone(), handle))
    }

    /// Kill a running job and mark it FAILURE
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job_dir = self.existing_job_dir(job_id)?;
        let lock = self.terminal_lock(job_id);
        let _guard = lock.lock();

        let status = StatusHandle::new(&job_dir);
        let record = match status.read()? {
            Some(record) if record.state == JobState::Running => record,
            other => {
                let state = other.map(|r| r.state).unwrap_or(JobState::NotStarted);
                return Err(AppError::InvalidState(format!(
                    "Job {} is not running ({})",
                    job_id, state
                )));
            }
        };

        if let Some((_, kill_tx)) = self.kill_switches.remove(job_id) {
            let _ = kill_tx.send(());
        } else if let Some(pid) = record.pid {
            match process::kill_tree(pid) {
                Ok(true) => {}
                Ok(false) => warn!("Trainer pid {} for job {} was already gone", pid, job_id),
                Err(e) => warn!("Failed to kill pid {} for job {}: {}", pid, job_id, e),
            }
        }

        status.write(&StatusRecord::failure(record.pid, CANCEL_MESSAGE))?;
        info!("Cancelled forecast job {}", job_id);
        Ok(())
    }

    /// State derived from the job's status handle alone
    pub fn status(&self, job_id: &str) -> Result<JobState> {
        let job_dir = self.existing_job_dir(job_id)?;
        StatusHandle::new(&job_dir).state()
    }

    pub fn status_record(&self, job_id: &str) -> Result<Option<StatusRecord>> {
        let job_dir = self.existing_job_dir(job_id)?;
        StatusHandle::new(&job_dir).read()
    }

    pub fn get_job(&self, job_id: &str) -> Result<ForecastJob> {
        self.sqlite.get_job(job_id)
    }

    /// Jobs newest first
    pub fn list_jobs(&self) -> Result<Vec<ForecastJob>> {
        self.sqlite.list_jobs()
    }

    pub fn overview(&self) -> Result<Vec<JobOverview>> {
        let mut overview = Vec::new();
        for job in self.list_jobs()? {
            let record = StatusHandle::new(&self.job_dir(&job.id)).read()?;
            overview.push(JobOverview {
                status: record.as_ref().map(|r| r.state).unwrap_or(JobState::NotStarted),
                error: record.and_then(|r| r.error),
                job,
            });
        }
        Ok(overview)
    }

    /// Newest job that completed
    pub fn latest_successful(&self) -> Result<Option<ForecastJob>> {
        for job in self.list_jobs()? {
            if StatusHandle::new(&self.job_dir(&job.id)).state()? == JobState::Completed {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// Snapshot the job was created with
    pub fn snapshot(&self, job_id: &str) -> Result<SnapshotTable> {
        let job_dir = self.existing_job_dir(job_id)?;
        SnapshotTable::read_csv(&job_dir.join(SNAPSHOT_FILE))
    }

    /// Settle RUNNING jobs that no live host supervises any more.
    ///
    /// A trainer that left a valid result file is recorded and moved to
    /// COMPLETED. One that died without a result is moved to FAILURE. Jobs
    /// whose supervising host is still alive, or whose unsupervised trainer
    /// is still running without a result, are left alone. Returns the ids of
    /// the jobs that were moved.
    pub fn reconcile_orphans(&self) -> Result<Vec<String>> {
        let mut reconciled = Vec::new();
        let this_host = std::process::id();

        for job in self.list_jobs()? {
            if self.kill_switches.contains_key(&job.id) {
                continue;
            }

            let lock = self.terminal_lock(&job.id);
            let _guard = lock.lock();

            let job_dir = self.job_dir(&job.id);
            let status = StatusHandle::new(&job_dir);
            let record = match status.read()? {
                Some(record) if record.state == JobState::Running => record,
                _ => continue,
            };

            let supervised_elsewhere = record
                .host_pid
                .map(|host| host != this_host && process::is_alive(host))
                .unwrap_or(false);
            if supervised_elsewhere {
                continue;
            }

            match supervisor::record_result(
                &self.sqlite,
                &job.id,
                &job_dir.join(RESULT_FILE),
                &artifact_path(&job_dir, &job.id),
            ) {
                Ok(()) => {
                    info!("Forecast job {} finished while unsupervised", job.id);
                    status.write(&StatusRecord::completed(record.pid))?;
                }
                Err(AppError::JobFailure(reason)) => {
                    if record.pid.map(process::is_alive).unwrap_or(false) {
                        continue;
                    }
                    warn!("Forecast job {}: {} ({})", job.id, ORPHAN_MESSAGE, reason);
                    status.write(&StatusRecord::failure(record.pid, ORPHAN_MESSAGE))?;
                }
                Err(e) => return Err(e),
            }
            reconciled.push(job.id);
        }

        Ok(reconciled)
    }
}

fn artifact_path(job_dir: &Path, job_id: &str) -> PathBuf {
    job_dir.join(format!("{}.model", job_id))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::db::duckdb::DuckDb;
    use crate::db::sqlite::ForecastSettingsUpdate;
    use crate::services::IngestRow;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const GOOD_TRAINER: &str = r#"printf '{"accuracy":{"train":0.91,"test":0.87},"forecast":[1.5,2.5]}' > "$LOADCAST_RESULT""#;

    struct Fixture {
        _dir: TempDir,
        sqlite: Arc<SqliteDb>,
        stores: SeriesStores,
        settings: ForecastSettings,
        output_dir: PathBuf,
    }

    impl Fixture {
        fn new(with_forecast: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let sqlite = Arc::new(SqliteDb::open_in_memory().unwrap());
            let settings = sqlite
                .update_forecast_settings(ForecastSettingsUpdate {
                    min_historical_load: Some(24),
                    min_historical_weather: Some(24),
                    min_forecast_weather: Some(24),
                    ..Default::default()
                })
                .unwrap();
            let duckdb = Arc::new(DuckDb::open_in_memory().unwrap());
            let stores = SeriesStores::new(duckdb, &settings);

            let hours = |day: u32, value: f64| -> Vec<IngestRow> {
                let date = NaiveDate::from_ymd_opt(2022, 1, day).unwrap();
                (0..24)
                    .map(|h| IngestRow::at(date.and_hms_opt(h, 0, 0).unwrap(), Some(value + h as f64)))
                    .collect()
            };
            stores.historical_load.ingest(&hours(1, 100.0)).unwrap();
            stores.historical_weather.ingest(&hours(1, 5.0)).unwrap();
            if with_forecast {
                stores.forecast_weather.ingest(&hours(2, 7.0)).unwrap();
            }

            let output_dir = dir.path().join("output");
            Self {
                _dir: dir,
                sqlite,
                stores,
                settings,
                output_dir,
            }
        }

        fn orchestrator(&self, script: &str) -> JobOrchestrator {
            let trainer = TrainerEntrypoint::new(
                "sh",
                vec!["-c".to_string(), script.to_string(), "trainer".to_string()],
            );
            JobOrchestrator::new(self.sqlite.clone(), self.output_dir.clone(), trainer)
        }
    }

    #[test]
    fn test_create_without_forecast_weather_is_precondition_error() {
        let fixture = Fixture::new(false);
        let result = fixture.orchestrator(GOOD_TRAINER).create(&fixture.stores, &fixture.settings);
        assert!(matches!(result, Err(AppError::Precondition(_))));
        assert!(!fixture.output_dir.exists() || fs::read_dir(&fixture.output_dir).unwrap().count() == 0);
    }

    #[test]
    fn test_create_writes_snapshot_and_record() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let day2 = NaiveDate::from_ymd_opt(2022, 1, 2).unwrap();
        assert_eq!(job.start_date, day2.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(job.end_date, day2.and_hms_opt(23, 0, 0).unwrap());
        assert_eq!(job.epochs, 1);
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::NotStarted);

        let snapshot = orchestrator.snapshot(&job.id).unwrap();
        assert_eq!(snapshot.len(), 48);
        assert_eq!(snapshot.forecast_rows().count(), 24);
        assert_eq!(orchestrator.get_job(&job.id).unwrap(), job);
    }

    #[test]
    fn test_two_creates_in_one_second_both_succeed() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let created_at = Local::now().naive_local();

        let (first, _) = orchestrator.allocate_job_dir(created_at).unwrap();
        let (second, _) = orchestrator.allocate_job_dir(created_at).unwrap();
        assert_ne!(first, second);
        assert!(second.starts_with(&first));
    }

    #[test]
    fn test_launch_outside_runtime_fails() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        assert!(matches!(orchestrator.launch(&job), Err(AppError::Internal(_))));
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::NotStarted);
    }

    #[tokio::test]
    async fn test_launch_runs_to_completion() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let completion = orchestrator.launch(&job).unwrap();
        let record = orchestrator.status_record(&job.id).unwrap().unwrap();
        assert_eq!(record.state, JobState::Running);
        assert!(record.pid.is_some());

        assert_eq!(completion.wait().await.unwrap(), JobState::Completed);
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::Completed);

        let stored = orchestrator.get_job(&job.id).unwrap();
        assert_eq!(stored.forecast_values, Some(vec![1.5, 2.5]));
        assert_eq!(stored.accuracy.unwrap().test, 0.87);
        assert_eq!(orchestrator.latest_successful().unwrap().unwrap().id, job.id);

        // A second orchestrator over the same directories agrees
        let other = fixture.orchestrator("exit 1");
        assert_eq!(other.status(&job.id).unwrap(), JobState::Completed);

        assert!(matches!(orchestrator.cancel(&job.id), Err(AppError::InvalidState(_))));
        assert!(matches!(orchestrator.launch(&job), Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_trainer_receives_snapshot_and_epochs() {
        let fixture = Fixture::new(true);
        let script = r#"test -f "$1" && test "$2" = "1" && test "$LOADCAST_HOURS_PRIOR" = "24" && printf '{"accuracy":{"train":1,"test":1},"forecast":[]}' > "$LOADCAST_RESULT""#;
        let orchestrator = fixture.orchestrator(script);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let state = orchestrator.launch(&job).unwrap().wait().await.unwrap();
        assert_eq!(state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_worker_failure_goes_to_completion() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator("exit 3");
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let completion = orchestrator.launch(&job).unwrap();
        match completion.wait().await {
            Err(AppError::JobFailure(message)) => assert!(message.contains("exit")),
            other => panic!("unexpected result: {:?}", other),
        }

        let record = orchestrator.status_record(&job.id).unwrap().unwrap();
        assert_eq!(record.state, JobState::Failure);
        assert!(record.error.is_some());
        assert_eq!(orchestrator.latest_successful().unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_result_file_is_failure() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator("exit 0");
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let result = orchestrator.launch(&job).unwrap().wait().await;
        assert!(matches!(result, Err(AppError::JobFailure(_))));
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::Failure);
    }

    #[tokio::test]
    async fn test_unstartable_trainer_fails_the_job() {
        let fixture = Fixture::new(true);
        let orchestrator = JobOrchestrator::new(
            fixture.sqlite.clone(),
            fixture.output_dir.clone(),
            TrainerEntrypoint::new("/nonexistent/loadcast-trainer", Vec::new()),
        );
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let completion = orchestrator.launch(&job).unwrap();
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::Failure);
        assert!(matches!(completion.wait().await, Err(AppError::JobFailure(_))));
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator("sleep 30");
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        assert!(matches!(orchestrator.cancel(&job.id), Err(AppError::InvalidState(_))));

        let completion = orchestrator.launch(&job).unwrap();
        orchestrator.cancel(&job.id).unwrap();
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::Failure);

        assert!(matches!(completion.wait().await, Err(AppError::JobFailure(_))));
        let record = orchestrator.status_record(&job.id).unwrap().unwrap();
        assert_eq!(record.state, JobState::Failure);
        assert_eq!(record.error.as_deref(), Some(CANCEL_MESSAGE));
    }

    #[tokio::test]
    async fn test_cancel_from_another_instance_kills_by_pid() {
        let fixture = Fixture::new(true);
        let launcher = fixture.orchestrator("sleep 30");
        let job = launcher.create(&fixture.stores, &fixture.settings).unwrap();
        let completion = launcher.launch(&job).unwrap();

        let other = fixture.orchestrator("sleep 30");
        other.cancel(&job.id).unwrap();

        assert!(matches!(completion.wait().await, Err(AppError::JobFailure(_))));
        assert_eq!(launcher.status(&job.id).unwrap(), JobState::Failure);
    }

    fn dead_pid() -> u32 {
        let mut finished = std::process::Command::new("true").spawn().unwrap();
        let pid = finished.id();
        finished.wait().unwrap();
        pid
    }

    #[tokio::test]
    async fn test_cancel_kills_processes_started_by_the_trainer() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(r#"(sleep 1; touch "$LOADCAST_ARTIFACT") & wait"#);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let completion = orchestrator.launch(&job).unwrap();
        orchestrator.cancel(&job.id).unwrap();
        assert!(matches!(completion.wait().await, Err(AppError::JobFailure(_))));

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(!artifact_path(&orchestrator.job_dir(&job.id), &job.id).exists());
    }

    #[tokio::test]
    async fn test_failed_running_write_kills_the_trainer() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(r#"sleep 1; touch "$LOADCAST_ARTIFACT""#);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        // A directory in the way of the temporary status file breaks the write
        let job_dir = orchestrator.job_dir(&job.id);
        fs::create_dir(job_dir.join("status.json.tmp")).unwrap();

        assert!(matches!(orchestrator.launch(&job), Err(AppError::Io(_))));

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(!artifact_path(&job_dir, &job.id).exists());
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::NotStarted);
    }

    #[test]
    fn test_reconcile_records_result_left_by_dead_worker() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();
        let job_dir = orchestrator.job_dir(&job.id);

        fs::write(
            job_dir.join(RESULT_FILE),
            r#"{"accuracy":{"train":0.8,"test":0.7},"forecast":[3.0]}"#,
        )
        .unwrap();
        let status = StatusHandle::new(&job_dir);
        status
            .write(&StatusRecord::running(Some(dead_pid())).with_host(Some(dead_pid())))
            .unwrap();

        assert_eq!(orchestrator.reconcile_orphans().unwrap(), vec![job.id.clone()]);
        assert_eq!(orchestrator.status(&job.id).unwrap(), JobState::Completed);

        let stored = orchestrator.get_job(&job.id).unwrap();
        assert_eq!(stored.forecast_values, Some(vec![3.0]));
        assert_eq!(orchestrator.latest_successful().unwrap().unwrap().id, job.id);
    }

    #[test]
    fn test_reconcile_leaves_jobs_of_a_live_host_alone() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();

        let mut host = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let status = StatusHandle::new(&orchestrator.job_dir(&job.id));
        status
            .write(&StatusRecord::running(Some(dead_pid())).with_host(Some(host.id())))
            .unwrap();

        let reconciled = orchestrator.reconcile_orphans().unwrap();
        host.kill().unwrap();
        host.wait().unwrap();

        assert!(reconciled.is_empty());
        assert_eq!(status.state().unwrap(), JobState::Running);
    }

    #[test]
    fn test_reconcile_marks_dead_workers_failed() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        let job = orchestrator.create(&fixture.stores, &fixture.settings).unwrap();
        let dead_pid = dead_pid();

        let status = StatusHandle::new(&orchestrator.job_dir(&job.id));
        status.write(&StatusRecord::running(Some(dead_pid))).unwrap();

        assert_eq!(orchestrator.reconcile_orphans().unwrap(), vec![job.id.clone()]);
        let record = status.read().unwrap().unwrap();
        assert_eq!(record.state, JobState::Failure);
        assert_eq!(record.error.as_deref(), Some(ORPHAN_MESSAGE));

        assert!(orchestrator.reconcile_orphans().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_job() {
        let fixture = Fixture::new(true);
        let orchestrator = fixture.orchestrator(GOOD_TRAINER);
        assert!(matches!(orchestrator.status("2020-01-01.00-00-00"), Err(AppError::NotFound(_))));
        assert!(matches!(orchestrator.status("../etc"), Err(AppError::Validation(_))));
    }
}
