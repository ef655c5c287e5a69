//! Observability primitives
//!
//! Counters for the ingestion pipeline. Logging itself goes through
//! `tracing` at the call sites.

pub mod metrics;

pub use metrics::{IngestionMetrics, IngestionMetricsSnapshot};
