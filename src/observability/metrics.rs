//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (request count, latency, demo work histograms)
//! - Expose a Prometheus-compatible scrape endpoint in traced mode
//!
//! # Metrics
//! - `http_server_requests_total` (counter): requests by route, method, status
//! - `http_server_request_duration_seconds` (histogram): latency distribution
//! - `example.sleep.duration` (histogram, seconds): simulated `/single` work
//! - `example.subrequests` (histogram): `/multi` fan-out size
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call is a no-op
//! - Histogram buckets tuned per metric

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "http_server_requests_total";
pub const REQUEST_DURATION: &str = "http_server_request_duration_seconds";
pub const SLEEP_DURATION: &str = "example.sleep.duration";
pub const SUBREQUESTS: &str = "example.subrequests";

const SLEEP_BUCKETS: &[f64] = &[0.05, 0.075, 0.1, 0.125, 0.150, 0.2];
const SUBREQUEST_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(SLEEP_DURATION.to_string()), SLEEP_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full(SUBREQUESTS.to_string()), SUBREQUEST_BUCKETS)?
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
        .install()?;

    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, route: &'static str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
}
