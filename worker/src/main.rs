// Worker binary entry point
// Runs every configured transfer source, once or on a poll interval

mod runner;

use anyhow::Result;
use common::config::{Settings, SourceConfig};
use common::telemetry;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;
    info!("Starting transfer worker");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    info!(sources = settings.sources.len(), "Configuration loaded successfully");

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    if settings.sources.is_empty() {
        warn!("No transfer sources configured, nothing to do");
        return Ok(());
    }

    match settings.worker.poll_interval_seconds {
        None => run_all(&settings.sources).await,
        Some(seconds) => {
            let interval = Duration::from_secs(seconds);
            info!(poll_interval_seconds = seconds, "Worker is running. Press Ctrl+C to shutdown");
            loop {
                run_all(&settings.sources).await;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    result = signal::ctrl_c() => {
                        match result {
                            Ok(()) => info!("Shutdown signal received"),
                            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
                        }
                        break;
                    }
                }
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}

/// Run every source concurrently, one blocking task and one connection each
async fn run_all(sources: &[SourceConfig]) {
    let handles: Vec<_> = sources
        .iter()
        .cloned()
        .map(|source| {
            tokio::task::spawn_blocking(move || {
                let outcome = runner::run_source(&source);
                (source.name, outcome)
            })
        })
        .collect();

    for handle in handles {
        match handle.await {
            Ok((name, Ok(report))) => info!(
                source = %name,
                succeeded = report.succeeded,
                failed = report.failed,
                "Source run finished"
            ),
            Ok((name, Err(e))) => error!(
                source = %name,
                kind = %e.kind,
                error = %e,
                "Source run failed"
            ),
            Err(e) => error!(error = %e, "Source task panicked"),
        }
    }
}
