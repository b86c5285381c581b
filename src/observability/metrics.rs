//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_requests_total` (counter): requests by method, status
//! - `mirror_request_duration_seconds` (histogram): end-to-end latency
//! - `mirror_rewrites_total` (counter): rewritten bodies by kind (html, redirect)
//! - `mirror_redirect_failures_total` (counter): failed redirect fetches

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and its HTTP listener.
///
/// Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "mirror_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mirror_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rewrite(kind: &'static str) {
    metrics::counter!("mirror_rewrites_total", "kind" => kind).increment(1);
}

pub fn record_redirect_failure() {
    metrics::counter!("mirror_redirect_failures_total").increment(1);
}
