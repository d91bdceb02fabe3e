// Telemetry module for structured logging and transfer metrics

use crate::errors::ErrorKind;
use crate::models::TransferDirection;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting
///
/// `RUST_LOG` takes precedence over the configured `log_level`.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, "Structured logging initialized");
    Ok(())
}

/// Initialize the Prometheus exporter and describe the transfer metrics
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "transfer_files_succeeded_total",
        "Files transferred successfully"
    );
    describe_counter!(
        "transfer_files_failed_total",
        "Files that failed after every retry attempt"
    );
    describe_counter!(
        "transfer_batches_aborted_total",
        "Batches aborted after consecutive file failures"
    );
    describe_histogram!(
        "transfer_batch_duration_seconds",
        "Duration of get/put batches in seconds"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );
    Ok(())
}

#[inline]
pub fn record_file_succeeded(direction: TransferDirection, host: &str) {
    counter!(
        "transfer_files_succeeded_total",
        "direction" => direction.as_str(),
        "host" => host.to_string()
    )
    .increment(1);
}

#[inline]
pub fn record_file_failed(direction: TransferDirection, host: &str, kind: ErrorKind) {
    counter!(
        "transfer_files_failed_total",
        "direction" => direction.as_str(),
        "host" => host.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

#[inline]
pub fn record_batch_aborted(direction: TransferDirection, host: &str) {
    counter!(
        "transfer_batches_aborted_total",
        "direction" => direction.as_str(),
        "host" => host.to_string()
    )
    .increment(1);
}

/// Records the batch duration in seconds
#[inline]
pub fn record_batch_duration(direction: TransferDirection, duration: Duration) {
    histogram!(
        "transfer_batch_duration_seconds",
        "direction" => direction.as_str()
    )
    .record(duration.as_secs_f64());
}
