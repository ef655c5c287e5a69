//! Port interfaces for job scheduling

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use conduit_domain::{ConduitError, Result};
use uuid::Uuid;

/// Unit of work run on every trigger of a job.
pub type JobTask = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure as a [`JobTask`].
pub fn job_task<F, Fut>(run: F) -> JobTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> { Box::pin(run()) })
}

/// A cron expression evaluated in a specific time zone.
///
/// Renders as `"TZ=<zone> <expression>"`; parsing accepts the same form, and
/// a bare expression is taken to be UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub timezone: Tz,
    pub expression: String,
}

impl CronSchedule {
    pub fn new(timezone: Tz, expression: impl Into<String>) -> Self {
        Self { timezone, expression: expression.into() }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TZ={} {}", self.timezone.name(), self.expression)
    }
}

impl FromStr for CronSchedule {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some(rest) = s.strip_prefix("TZ=") else {
            return Ok(Self::new(Tz::UTC, s));
        };

        let (zone, expression) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| ConduitError::InvalidInput(format!("cron schedule `{s}` has no expression")))?;
        let timezone: Tz =
            zone.parse().map_err(|_| ConduitError::InvalidInput(format!("unknown time zone `{zone}`")))?;
        Ok(Self::new(timezone, expression.trim()))
    }
}

/// Runs tasks on cron schedules or once after a delay.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Register a recurring job; returns its handle.
    async fn schedule_cron(&self, schedule: &CronSchedule, task: JobTask) -> Result<Uuid>;

    /// Register a job that runs once after `delay`.
    async fn schedule_once(&self, delay: Duration, task: JobTask) -> Result<Uuid>;

    /// Remove a job; later triggers do not fire. Running tasks complete.
    async fn remove(&self, job_id: Uuid) -> Result<()>;
}
