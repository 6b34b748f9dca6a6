//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, thresholds in range, durations > 0)
//! - Detect duplicate entries in the stage order
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ResilienceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate every section, collecting all violations.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new(
            "retry.max_delay_ms",
            "must not be smaller than retry.base_delay_ms",
        ));
    }

    let cb = &config.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            "must be in (0, 100]",
        ));
    }
    if cb.sliding_window_size == 0 {
        errors.push(ValidationError::new("circuit_breaker.sliding_window_size", "must be at least 1"));
    }
    if cb.minimum_number_of_calls == 0 {
        errors.push(ValidationError::new("circuit_breaker.minimum_number_of_calls", "must be at least 1"));
    }
    if cb.permitted_calls_in_half_open_state == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.permitted_calls_in_half_open_state",
            "must be at least 1",
        ));
    }

    let rl = &config.rate_limiter;
    if rl.limit_for_period == 0 {
        errors.push(ValidationError::new("rate_limiter.limit_for_period", "must be at least 1"));
    }
    if rl.limit_refresh_period_ms == 0 {
        errors.push(ValidationError::new("rate_limiter.limit_refresh_period_ms", "must be greater than 0"));
    }

    if config.bulkhead.max_concurrent_calls == 0 {
        errors.push(ValidationError::new("bulkhead.max_concurrent_calls", "must be at least 1"));
    }

    if config.time_limiter.timeout_ms == 0 {
        errors.push(ValidationError::new("time_limiter.timeout_ms", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for kind in &config.order {
        if !seen.insert(kind) {
            errors.push(ValidationError::new("order", format!("{kind:?} is listed more than once")));
        }
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
