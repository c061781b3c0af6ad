//! Metrics collection and exposition.
//!
//! # Metrics
//! - `profiler_sessions_total` (counter): debug endpoint sessions started
//! - `profiler_bind_failures_total` (counter): sessions that could not bind
//! - `profiler_shutdown_timeouts_total` (counter): drains that hit the deadline
//! - `profiler_endpoint_active` (gauge): 1 while a session is serving
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed (see [`init_metrics`]).

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(
        "profiler_sessions_total",
        "Debug endpoint sessions started"
    );
    describe_counter!(
        "profiler_bind_failures_total",
        "Sessions whose listener failed to bind"
    );
    describe_counter!(
        "profiler_shutdown_timeouts_total",
        "Graceful shutdowns that exceeded the deadline"
    );
    describe_gauge!(
        "profiler_endpoint_active",
        "1 while the debug endpoint is serving"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_session_started() {
    counter!("profiler_sessions_total").increment(1);
}

pub fn record_endpoint_active(active: bool) {
    gauge!("profiler_endpoint_active").set(if active { 1.0 } else { 0.0 });
}

pub fn record_bind_failure() {
    counter!("profiler_bind_failures_total").increment(1);
}

pub fn record_shutdown_timeout() {
    counter!("profiler_shutdown_timeouts_total").increment(1);
}
