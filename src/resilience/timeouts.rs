//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the duration of the wrapped call
//! - Cancel the call cleanly on timeout (the inner future is dropped)
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is an ordinary `CallError::Timeout` to every layer above

use std::time::Duration;

use crate::callable::{Args, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;
use crate::observability::metrics;

/// Fails calls that take longer than `timeout_duration`.
#[derive(Debug, Clone)]
pub struct TimeLimiter {
    name: String,
    timeout: Duration,
}

impl TimeLimiter {
    pub fn new(name: impl Into<String>, timeout_duration: Duration) -> Self {
        Self {
            name: name.into(),
            timeout: timeout_duration,
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }
}

impl Wrapper for TimeLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        let limiter = self.clone();
        let target = target.clone();
        let operation = operation.name().to_string();

        Callable::new(move |args: Args| {
            let limiter = limiter.clone();
            let call = call.clone();
            let target = target.clone();
            let operation = operation.clone();
            async move {
                match tokio::time::timeout(limiter.timeout, call.call(args)).await {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        tracing::warn!(
                            time_limiter = %limiter.name,
                            operation = %operation,
                            timeout_ms = limiter.timeout.as_millis() as u64,
                            "Call timed out"
                        );
                        metrics::record_timeout(&limiter.name, &target, &operation);
                        Err(CallError::Timeout {
                            name: limiter.name.clone(),
                            after: Some(limiter.timeout),
                        })
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Signature;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let limiter = TimeLimiter::new("greetings", Duration::from_millis(100));
        let slow = Callable::new(|_args: Args| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(json!("late"))
        });
        let call = limiter.wrap(
            slow,
            &Operation::remote(Signature::new("greeting")),
            &TargetIdentity::new("GreetingService", "greetings"),
        );

        let err = call.call(vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Timeout { after: Some(d), .. } if d == Duration::from_millis(100)
        ));
    }

    #[tokio::test]
    async fn test_fast_call_passes() {
        let limiter = TimeLimiter::new("greetings", Duration::from_secs(1));
        let fast = Callable::new(|_args: Args| async { Ok(json!("hi")) });
        let call = limiter.wrap(
            fast,
            &Operation::remote(Signature::new("greeting")),
            &TargetIdentity::new("GreetingService", "greetings"),
        );

        assert_eq!(call.call(vec![]).await.unwrap(), json!("hi"));
    }
}
