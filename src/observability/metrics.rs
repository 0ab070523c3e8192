//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): total requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rewrite_decisions_total` (counter): rewrite outcomes by variant, decision
//! - `proxy_url_replacements_total` (counter): URLs substituted in JavaScript bodies
//! - `proxy_upgrade_bypass_total` (counter): protocol upgrades passed through unbuffered
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (method, status, variant, decision)

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rewrite_decision(variant: &'static str, decision: &'static str) {
    counter!(
        "proxy_rewrite_decisions_total",
        "variant" => variant,
        "decision" => decision
    )
    .increment(1);
}

pub fn record_url_replacements(count: usize) {
    if count > 0 {
        counter!("proxy_url_replacements_total").increment(count as u64);
    }
}

pub fn record_upgrade_bypass() {
    counter!("proxy_upgrade_bypass_total").increment(1);
}
