//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define resilience metrics (calls, retries, rejections, circuit state)
//! - Expose a Prometheus-compatible metrics endpoint
//! - Label every series with the client it belongs to
//!
//! # Metrics
//! - `resilient_calls_total` (counter): calls by client, operation, outcome
//! - `resilient_call_duration_seconds` (histogram): latency distribution
//! - `resilient_retry_calls_total` (counter): retried calls by outcome
//! - `resilient_retry_attempts` (histogram): attempts per retried call
//! - `resilient_circuit_breaker_calls_total` (counter): successful / failed / not_permitted
//! - `resilient_circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `resilient_rate_limiter_rejected_total` (counter)
//! - `resilient_bulkhead_rejected_total` (counter)
//! - `resilient_bulkhead_available_calls` (gauge)
//! - `resilient_timeouts_total` (counter)
//! - `resilient_undecorated_dispatch_total` (counter): calls that bypassed their chain
//!
//! # Design Decisions
//! - The client label comes from the `TargetIdentity` passed in, never from global state
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::time::Instant;

use crate::contract::TargetIdentity;
use crate::resilience::CircuitState;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed call of a client operation.
pub fn record_call(target: &TargetIdentity, operation: &str, outcome: &'static str, start: Instant) {
    counter!(
        "resilient_calls_total",
        "client" => target.name().to_string(),
        "contract" => target.contract().to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "resilient_call_duration_seconds",
        "client" => target.name().to_string(),
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the final outcome of a retried call.
pub fn record_retry(name: &str, target: &TargetIdentity, operation: &str, attempts: u32, outcome: &'static str) {
    let kind = match (outcome, attempts) {
        ("success", 1) => "successful_without_retry",
        ("success", _) => "successful_with_retry",
        (_, 1) => "failed_without_retry",
        _ => "failed_with_retry",
    };
    counter!(
        "resilient_retry_calls_total",
        "retry" => name.to_string(),
        "client" => target.name().to_string(),
        "operation" => operation.to_string(),
        "kind" => kind
    )
    .increment(1);
    histogram!("resilient_retry_attempts", "retry" => name.to_string()).record(attempts as f64);
}

pub fn record_circuit_call(name: &str, target: &TargetIdentity, operation: &str, kind: &'static str) {
    counter!(
        "resilient_circuit_breaker_calls_total",
        "circuit_breaker" => name.to_string(),
        "client" => target.name().to_string(),
        "operation" => operation.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_circuit_state(name: &str, state: CircuitState) {
    gauge!("resilient_circuit_breaker_state", "circuit_breaker" => name.to_string()).set(state as u8 as f64);
}

pub fn record_rate_limited(name: &str, target: &TargetIdentity, operation: &str) {
    counter!(
        "resilient_rate_limiter_rejected_total",
        "rate_limiter" => name.to_string(),
        "client" => target.name().to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_bulkhead_rejected(name: &str, target: &TargetIdentity, operation: &str) {
    counter!(
        "resilient_bulkhead_rejected_total",
        "bulkhead" => name.to_string(),
        "client" => target.name().to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_bulkhead_available(name: &str, available: usize) {
    gauge!("resilient_bulkhead_available_calls", "bulkhead" => name.to_string()).set(available as f64);
}

pub fn record_timeout(name: &str, target: &TargetIdentity, operation: &str) {
    counter!(
        "resilient_timeouts_total",
        "time_limiter" => name.to_string(),
        "client" => target.name().to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a remote operation dispatched without its decorated callable.
pub fn record_undecorated_dispatch(target: &TargetIdentity, operation: &str) {
    counter!(
        "resilient_undecorated_dispatch_total",
        "client" => target.name().to_string(),
        "contract" => target.contract().to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}
