//! Ingestion pipeline counters
//!
//! ## Design
//! - **No locking** - independent atomic counters
//! - **Relaxed ordering** - no counter is derived from another

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the scheduler, fetch and process stages.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    jobs_fired: AtomicU64,
    fetch_errors: AtomicU64,
    retries_scheduled: AtomicU64,
    auth_budget_exhausted: AtomicU64,
    schema_rejections: AtomicU64,
    updates_upserted: AtomicU64,
    tombstones_written: AtomicU64,
}

/// Point-in-time copy of [`IngestionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionMetricsSnapshot {
    pub jobs_fired: u64,
    pub fetch_errors: u64,
    pub retries_scheduled: u64,
    pub auth_budget_exhausted: u64,
    pub schema_rejections: u64,
    pub updates_upserted: u64,
    pub tombstones_written: u64,
}

impl IngestionMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_job_fired(&self) {
        self.jobs_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Credentials were dropped after too many token failures.
    pub fn record_auth_budget_exhausted(&self) {
        self.auth_budget_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_schema_rejection(&self) {
        self.schema_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_upserted(&self) {
        self.updates_upserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tombstone(&self) {
        self.tombstones_written.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> IngestionMetricsSnapshot {
        IngestionMetricsSnapshot {
            jobs_fired: self.jobs_fired.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            auth_budget_exhausted: self.auth_budget_exhausted.load(Ordering::Relaxed),
            schema_rejections: self.schema_rejections.load(Ordering::Relaxed),
            updates_upserted: self.updates_upserted.load(Ordering::Relaxed),
            tombstones_written: self.tombstones_written.load(Ordering::Relaxed),
        }
    }
}
