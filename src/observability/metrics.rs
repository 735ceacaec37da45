//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waypoint_resolutions_total` (counter): resolution passes by final status
//! - `waypoint_resolution_duration_seconds` (histogram): time per pass
//! - `waypoint_navigation_superseded_total` (counter): results discarded because
//!   a newer navigation was requested
//! - `waypoint_redirect_loops_total` (counter): navigations stopped by the hop limit
//! - `waypoint_crawl_pages_total` (counter): crawled URLs by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a cheap no-op, which keeps tests and library
//!   users unaffected

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::RouteStatus;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_resolution(status: RouteStatus, started: Instant) {
    ::metrics::counter!("waypoint_resolutions_total", "status" => status.as_str()).increment(1);
    ::metrics::histogram!("waypoint_resolution_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_superseded() {
    ::metrics::counter!("waypoint_navigation_superseded_total").increment(1);
}

pub fn record_redirect_loop() {
    ::metrics::counter!("waypoint_redirect_loops_total").increment(1);
}

pub fn record_crawl_page(outcome: &'static str) {
    ::metrics::counter!("waypoint_crawl_pages_total", "outcome" => outcome).increment(1);
}
