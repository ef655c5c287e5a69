use conduit_common::IngestionMetricsSnapshot;
use conduit_domain::ConduitError;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). Setting
/// `CONDUIT_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CONDUIT_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if json { builder.json().try_init() } else { builder.try_init() };
    if installed.is_err() {
        // a subscriber is already set, e.g. by a test harness
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Convert a `ConduitError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &ConduitError) -> &'static str {
    match error {
        ConduitError::Database(_) => "database",
        ConduitError::Config(_) => "config",
        ConduitError::Network(_) => "network",
        ConduitError::Auth(_) => "auth",
        ConduitError::NotFound(_) => "not_found",
        ConduitError::InvalidInput(_) => "invalid_input",
        ConduitError::Validation(_) => "validation",
        ConduitError::Fetch(_) => "fetch",
        ConduitError::Internal(_) => "internal",
    }
}

/// Log the ingestion counters with structured fields.
pub fn log_metrics(snapshot: &IngestionMetricsSnapshot) {
    info!(
        jobs_fired = snapshot.jobs_fired,
        fetch_errors = snapshot.fetch_errors,
        retries_scheduled = snapshot.retries_scheduled,
        auth_budget_exhausted = snapshot.auth_budget_exhausted,
        schema_rejections = snapshot.schema_rejections,
        updates_upserted = snapshot.updates_upserted,
        tombstones_written = snapshot.tombstones_written,
        "ingestion_metrics"
    );
}
