//! Configuration schema definitions.
//!
//! This module defines the configuration of a client's decorator chain.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a resilient client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry configuration.
    pub retry: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Rate limiter configuration.
    pub rate_limiter: RateLimiterConfig,

    /// Bulkhead (concurrency limit) configuration.
    pub bulkhead: BulkheadConfig,

    /// Time limiter configuration.
    pub time_limiter: TimeLimiterConfig,

    /// Registration order of the enabled wrappers, outermost first.
    pub order: Vec<StageKind>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            bulkhead: BulkheadConfig::default(),
            time_limiter: TimeLimiterConfig::default(),
            order: StageKind::DEFAULT_ORDER.to_vec(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A configurable wrapper kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Retry,
    CircuitBreaker,
    RateLimiter,
    TimeLimiter,
    Bulkhead,
}

impl StageKind {
    pub const DEFAULT_ORDER: [StageKind; 5] = [
        StageKind::Retry,
        StageKind::CircuitBreaker,
        StageKind::RateLimiter,
        StageKind::TimeLimiter,
        StageKind::Bulkhead,
    ];
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the circuit breaker.
    pub enabled: bool,

    /// Failure rate (percent) at which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Number of most recent calls the failure rate is computed over.
    pub sliding_window_size: usize,

    /// Calls required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,

    /// Time spent open before probing, in milliseconds.
    pub wait_duration_in_open_state_ms: u64,

    /// Probe calls permitted while half-open.
    pub permitted_calls_in_half_open_state: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate_threshold: 50.0,
            sliding_window_size: 100,
            minimum_number_of_calls: 100,
            wait_duration_in_open_state_ms: 60_000,
            permitted_calls_in_half_open_state: 10,
        }
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Permits per refresh period.
    pub limit_for_period: u32,

    /// Refresh period in milliseconds.
    pub limit_refresh_period_ms: u64,

    /// Longest a caller waits for a permit, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit_for_period: 50,
            limit_refresh_period_ms: 500,
            timeout_ms: 5000,
        }
    }
}

/// Bulkhead configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadConfig {
    /// Enable the concurrency limit.
    pub enabled: bool,

    /// Maximum concurrent calls.
    pub max_concurrent_calls: usize,

    /// Longest a caller waits for a slot, in milliseconds (0 = reject immediately).
    pub max_wait_ms: u64,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent_calls: 25,
            max_wait_ms: 0,
        }
    }
}

/// Time limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeLimiterConfig {
    /// Enable the call timeout.
    pub enabled: bool,

    /// Call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TimeLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Compact single-line log output.
    pub log_compact: bool,

    /// Register per-operation call metrics outermost.
    pub instrumentation: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_compact: false,
            instrumentation: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
