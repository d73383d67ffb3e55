//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by binding, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_upstream_closed_total` (counter): upstream connections closed
//!
//! # Design Decisions
//! - Labels are the RPC method path and the HTTP status code
//! - Unmatched requests are labelled `none`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
pub const UPSTREAM_CLOSED: &str = "gateway_upstream_closed_total";

/// Install the Prometheus recorder with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(binding: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(REQUESTS_TOTAL, "binding" => binding.to_string(), "status" => status.clone())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "binding" => binding.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_closed(endpoint: &str) {
    metrics::counter!(UPSTREAM_CLOSED, "endpoint" => endpoint.to_string()).increment(1);
}
