//! Job scheduling over `tokio-cron-scheduler`
//!
//! [`CronJobRunner`] is the process-wide [`conduit_core::JobScheduler`]:
//! recurring jobs fire in the zone of their [`conduit_core::CronSchedule`],
//! one-shot jobs fire once after a delay, and every run is bounded by the
//! job timeout.

pub mod cron_runner;
pub mod error;

pub use cron_runner::{CronJobRunner, CronJobRunnerConfig};
pub use error::{SchedulerError, SchedulerResult};
