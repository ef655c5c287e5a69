//! Cron and one-shot job runner.
//!
//! Jobs may be registered before or after [`CronJobRunner::start`]; nothing
//! fires until the runner is started. Each run is wrapped in the configured
//! job timeout and abandoned when the runner stops.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use conduit_core::{job_task, CronSchedule, JobScheduler};
//! use conduit_infra::scheduling::{CronJobRunner, CronJobRunnerConfig};
//!
//! # async fn example() -> conduit_domain::Result<()> {
//! let runner = CronJobRunner::with_config(CronJobRunnerConfig::default()).await?;
//! let schedule = CronSchedule::new(chrono_tz::Europe::Amsterdam, "0 0 6 * * *");
//! runner.schedule_cron(&schedule, job_task(|| async { println!("good morning") })).await?;
//!
//! runner.start().await?;
//! // ... application runs ...
//! runner.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conduit_core::{CronSchedule, JobScheduler, JobTask};
use conduit_domain::constants::DEFAULT_JOB_TIMEOUT_SECS;
use conduit_domain::{Result, SchedulerConfig};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as CronScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct CronJobRunnerConfig {
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
}

impl Default for CronJobRunnerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SchedulerConfig> for CronJobRunnerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self { job_timeout: Duration::from_secs(config.job_timeout_seconds), ..Self::default() }
    }
}

/// [`JobScheduler`] with explicit lifecycle management.
pub struct CronJobRunner {
    scheduler: RwLock<CronScheduler>,
    config: CronJobRunnerConfig,
    running: AtomicBool,
    cancellation: CancellationToken,
}

impl CronJobRunner {
    /// Create a runner with the default configuration.
    pub async fn new() -> SchedulerResult<Self> {
        Self::with_config(CronJobRunnerConfig::default()).await
    }

    /// Create a runner with a custom configuration.
    pub async fn with_config(config: CronJobRunnerConfig) -> SchedulerResult<Self> {
        let scheduler = CronScheduler::new().await.map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        Ok(Self {
            scheduler: RwLock::new(scheduler),
            config,
            running: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
        })
    }

    /// Start firing registered jobs.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let start_timeout = self.config.start_timeout;
        let started = tokio::time::timeout(start_timeout, async {
            let guard = self.scheduler.read().await;
            guard.start().await
        })
        .await;

        let result = match started {
            Err(_) => Err(SchedulerError::Timeout { seconds: start_timeout.as_secs() }),
            Ok(Err(e)) => Err(SchedulerError::StartFailed(e.to_string())),
            Ok(Ok(())) => Ok(()),
        };
        if result.is_err() {
            self.running.store(false, Ordering::SeqCst);
        } else {
            info!("Job runner started");
        }
        result
    }

    /// Stop firing jobs and abandon runs in progress.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async {
            let mut guard = self.scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
        .map_err(|e| SchedulerError::StopFailed(e.to_string()))?;

        info!("Job runner stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn register(&self, job: Job, description: &str) -> SchedulerResult<Uuid> {
        let guard = self.scheduler.read().await;
        let job_id = guard.add(job).await.map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;
        debug!(job_id = %job_id, schedule = description, "Registered job");
        Ok(job_id)
    }
}

/// Run one trigger of `task`, bounded by `timeout` and `cancel`.
async fn run_bounded(task: JobTask, timeout: Duration, cancel: CancellationToken, job_id: Uuid) {
    if cancel.is_cancelled() {
        return;
    }

    let started = Instant::now();
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(job_id = %job_id, "Job abandoned on shutdown");
        }
        outcome = tokio::time::timeout(timeout, task()) => match outcome {
            Ok(()) => debug!(job_id = %job_id, elapsed_ms = started.elapsed().as_millis() as u64, "Job finished"),
            Err(_) => warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "Job timed out"),
        },
    }
}

#[async_trait]
impl JobScheduler for CronJobRunner {
    async fn schedule_cron(&self, schedule: &CronSchedule, task: JobTask) -> Result<Uuid> {
        let timeout = self.config.job_timeout;
        let cancel = self.cancellation.clone();

        let job = Job::new_async_tz(schedule.expression.as_str(), schedule.timezone, move |job_id, _scheduler| {
            Box::pin(run_bounded(task.clone(), timeout, cancel.clone(), job_id))
        })
        .map_err(|e| SchedulerError::InvalidSchedule { schedule: schedule.to_string(), reason: e.to_string() })?;

        Ok(self.register(job, &schedule.to_string()).await?)
    }

    async fn schedule_once(&self, delay: Duration, task: JobTask) -> Result<Uuid> {
        let timeout = self.config.job_timeout;
        let cancel = self.cancellation.clone();

        let job = Job::new_one_shot_async(delay, move |job_id, _scheduler| {
            Box::pin(run_bounded(task.clone(), timeout, cancel.clone(), job_id))
        })
        .map_err(|e| SchedulerError::InvalidSchedule { schedule: format!("once after {delay:?}"), reason: e.to_string() })?;

        Ok(self.register(job, "once").await?)
    }

    async fn remove(&self, job_id: Uuid) -> Result<()> {
        let guard = self.scheduler.read().await;
        guard.remove(&job_id).await.map_err(|e| SchedulerError::JobRemovalFailed(e.to_string()))?;
        debug!(job_id = %job_id, "Removed job");
        Ok(())
    }
}

impl Drop for CronJobRunner {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CronJobRunner dropped while running; cancelling jobs");
            self.cancellation.cancel();
        }
    }
}
