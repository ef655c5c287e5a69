//! Scheduler error types

use conduit_domain::ConduitError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Failed to create scheduler
    #[error("Failed to create scheduler: {0}")]
    CreationFailed(String),

    /// Failed to start scheduler
    #[error("Failed to start scheduler: {0}")]
    StartFailed(String),

    /// Failed to stop scheduler
    #[error("Failed to stop scheduler: {0}")]
    StopFailed(String),

    /// Cron expression or delay the scheduler cannot use
    #[error("Invalid schedule `{schedule}`: {reason}")]
    InvalidSchedule { schedule: String, reason: String },

    /// Failed to register job
    #[error("Failed to register job: {0}")]
    JobRegistrationFailed(String),

    /// Failed to remove job
    #[error("Failed to remove job: {0}")]
    JobRemovalFailed(String),

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let conduit_err = match err {
            SchedulerError::AlreadyRunning
            | SchedulerError::NotRunning
            | SchedulerError::InvalidSchedule { .. } => ConduitError::InvalidInput(err.to_string()),
            _ => ConduitError::Internal(err.to_string()),
        };
        InfraError(conduit_err)
    }
}

impl From<SchedulerError> for ConduitError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_mistakes_map_to_invalid_input() {
        let err: ConduitError =
            SchedulerError::InvalidSchedule { schedule: "nope".into(), reason: "bad field".into() }.into();
        assert!(matches!(err, ConduitError::InvalidInput(msg) if msg.contains("nope")));

        let err: ConduitError = SchedulerError::AlreadyRunning.into();
        assert!(matches!(err, ConduitError::InvalidInput(_)));
    }

    #[test]
    fn runtime_failures_map_to_internal() {
        let err: ConduitError = SchedulerError::Timeout { seconds: 5 }.into();
        assert_eq!(err, ConduitError::Internal("Operation timed out after 5s".into()));
    }
}
