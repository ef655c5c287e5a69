//! Conduit - integration ingestion service
//!
//! Loads configuration, wires the application context, starts the job
//! runner and feeds bus messages read from stdin to the event dispatcher
//! until interrupted.

use std::sync::Arc;

use anyhow::Context;
use conduit_api::bus::forward_lines;
use conduit_api::utils::logging::{error_label, init_tracing, log_metrics};
use conduit_api::AppContext;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const BUS_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so we can see .env loading
    init_tracing();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => warn!(error = %err, "could not load .env file"),
    }

    let config = conduit_infra::config::load().context("failed to load configuration")?;

    let context = match AppContext::new(config).await {
        Ok(context) => Arc::new(context),
        Err(err) => {
            error!(error = %err, kind = error_label(&err), "failed to initialise");
            return Err(err.into());
        }
    };
    context.start().await.context("failed to start scheduler")?;

    let (sender, receiver) = mpsc::channel(BUS_CAPACITY);
    let reader = tokio::spawn(forward_lines(BufReader::new(tokio::io::stdin()), sender));
    let dispatcher = {
        let context = Arc::clone(&context);
        tokio::spawn(async move { context.events.run(receiver).await })
    };

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    reader.abort();
    dispatcher.abort();
    log_metrics(&context.metrics.snapshot());
    context.shutdown().await?;
    Ok(())
}
