//! Decorator registration from configuration.

use std::time::Duration;

use crate::config::schema::{
    BulkheadConfig, CircuitBreakerConfig, RateLimiterConfig, ResilienceConfig, RetryConfig, StageKind,
};
use crate::decorators::DecoratorsBuilder;
use crate::resilience::{Bulkhead, CircuitBreaker, RateLimiter, Retry, TimeLimiter};

impl DecoratorsBuilder {
    /// Register the enabled wrappers of `config` in its configured order.
    ///
    /// Every primitive is named `name`. Fallbacks registered on the returned
    /// builder sit innermost, around the remote call.
    pub fn from_config(name: &str, config: &ResilienceConfig) -> Self {
        let mut builder = DecoratorsBuilder::default();
        if config.observability.instrumentation {
            builder = builder.with_instrumentation();
        }

        for kind in &config.order {
            builder = match kind {
                StageKind::Retry if config.retry.enabled => builder.with_retry(retry(name, &config.retry)),
                StageKind::CircuitBreaker if config.circuit_breaker.enabled => {
                    builder.with_circuit_breaker(circuit_breaker(name, &config.circuit_breaker))
                }
                StageKind::RateLimiter if config.rate_limiter.enabled => {
                    builder.with_rate_limiter(rate_limiter(name, &config.rate_limiter))
                }
                StageKind::TimeLimiter if config.time_limiter.enabled => builder.with_time_limiter(
                    TimeLimiter::new(name, Duration::from_millis(config.time_limiter.timeout_ms)),
                ),
                StageKind::Bulkhead if config.bulkhead.enabled => {
                    builder.with_bulkhead(bulkhead(name, &config.bulkhead))
                }
                _ => builder,
            };
        }

        tracing::debug!(client = %name, order = ?config.order, "Registered decorators from config");
        builder
    }
}

fn retry(name: &str, config: &RetryConfig) -> Retry {
    Retry::builder(name)
        .max_attempts(config.max_attempts)
        .base_delay(Duration::from_millis(config.base_delay_ms))
        .max_delay(Duration::from_millis(config.max_delay_ms))
        .build()
}

fn circuit_breaker(name: &str, config: &CircuitBreakerConfig) -> CircuitBreaker {
    CircuitBreaker::builder(name)
        .failure_rate_threshold(config.failure_rate_threshold)
        .sliding_window_size(config.sliding_window_size)
        .minimum_number_of_calls(config.minimum_number_of_calls)
        .wait_duration_in_open_state(Duration::from_millis(config.wait_duration_in_open_state_ms))
        .permitted_calls_in_half_open_state(config.permitted_calls_in_half_open_state)
        .build()
}

fn rate_limiter(name: &str, config: &RateLimiterConfig) -> RateLimiter {
    RateLimiter::builder(name)
        .limit_for_period(config.limit_for_period)
        .limit_refresh_period(Duration::from_millis(config.limit_refresh_period_ms))
        .timeout_duration(Duration::from_millis(config.timeout_ms))
        .build()
}

fn bulkhead(name: &str, config: &BulkheadConfig) -> Bulkhead {
    Bulkhead::builder(name)
        .max_concurrent_calls(config.max_concurrent_calls)
        .max_wait_duration(Duration::from_millis(config.max_wait_ms))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{remote_fn, CallContract, Signature};
    use crate::decorators::Decorators;
    use crate::dispatch::ResilientClient;
    use crate::error::{CallError, ErrorKind, RemoteError};

    async fn failure_under(order: Vec<StageKind>) -> CallError {
        let mut config = ResilienceConfig::default();
        config.order = order;
        config.circuit_breaker.enabled = false;
        config.observability.instrumentation = false;
        config.retry.max_attempts = 3;
        config.retry.base_delay_ms = 100;
        config.time_limiter.timeout_ms = 50;

        let contract = CallContract::builder("GreetingService")
            .remote(Signature::new("greeting").returns("String"))
            .build()
            .unwrap();
        let client = ResilientClient::builder(DecoratorsBuilder::from_config("greetings", &config).build())
            .remote(remote_fn(|_op, _args| async {
                Err(CallError::from(RemoteError::with_status(503, "down")))
            }))
            .build(contract)
            .unwrap();
        client.call("greeting", Vec::new()).await.unwrap_err()
    }

    #[test]
    fn test_default_config_order() {
        let decorators = DecoratorsBuilder::from_config("greetings", &ResilienceConfig::default()).build();
        assert_eq!(
            decorators.describe(),
            vec!["instrumentation", "greetings", "greetings", "greetings"]
        );
    }

    #[test]
    fn test_disabled_sections_register_nothing() {
        let mut config = ResilienceConfig::default();
        config.retry.enabled = false;
        config.circuit_breaker.enabled = false;
        config.time_limiter.enabled = false;
        config.observability.instrumentation = false;

        let decorators = DecoratorsBuilder::from_config("greetings", &config).build();
        assert!(decorators.is_empty());
        assert!(Decorators::default().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_order_is_respected() {
        let err = failure_under(vec![StageKind::TimeLimiter, StageKind::Retry]).await;
        assert!(err.is(ErrorKind::Timeout), "time limiter outside retry: {err}");

        let err = failure_under(vec![StageKind::Retry, StageKind::TimeLimiter]).await;
        assert!(err.is(ErrorKind::RemoteServer), "retry outside time limiter: {err}");
    }
}
