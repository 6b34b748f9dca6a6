//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retryable
//! - Re-invoke the wrapped call with exponential backoff + jitter
//! - Count outcomes (with/without retry)
//!
//! # Design Decisions
//! - Configuration errors and unknown operations are never retried
//! - Every attempt gets a fresh clone of the original arguments
//! - Jittered backoff prevents thundering herd

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::callable::{Args, CallResult, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

type RetryPredicate = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

/// Outcome counters of a [`Retry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryMetrics {
    pub successful_without_retry: u64,
    pub successful_with_retry: u64,
    pub failed_without_retry: u64,
    pub failed_with_retry: u64,
    pub attempts: u64,
}

#[derive(Default)]
struct Counters {
    successful_without_retry: AtomicU64,
    successful_with_retry: AtomicU64,
    failed_without_retry: AtomicU64,
    failed_with_retry: AtomicU64,
    attempts: AtomicU64,
}

struct RetryInner {
    name: String,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_on: RetryPredicate,
    counters: Counters,
}

/// Re-invokes failed calls up to `max_attempts` times in total.
#[derive(Clone)]
pub struct Retry {
    inner: Arc<RetryInner>,
}

impl Retry {
    pub fn builder(name: impl Into<String>) -> RetryBuilder {
        RetryBuilder {
            name: name.into(),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            retry_on: None,
        }
    }

    /// Three attempts, 100ms base delay.
    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn max_attempts(&self) -> u32 {
        self.inner.max_attempts
    }

    pub fn metrics(&self) -> RetryMetrics {
        let c = &self.inner.counters;
        RetryMetrics {
            successful_without_retry: c.successful_without_retry.load(Ordering::Relaxed),
            successful_with_retry: c.successful_with_retry.load(Ordering::Relaxed),
            failed_without_retry: c.failed_without_retry.load(Ordering::Relaxed),
            failed_with_retry: c.failed_with_retry.load(Ordering::Relaxed),
            attempts: c.attempts.load(Ordering::Relaxed),
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub async fn execute(&self, call: &Callable, args: Args, target: &TargetIdentity, operation: &str) -> CallResult {
        let inner = &self.inner;
        let mut attempt = 1;

        loop {
            inner.counters.attempts.fetch_add(1, Ordering::Relaxed);
            let error = match call.call(args.clone()).await {
                Ok(value) => {
                    let counter = if attempt == 1 {
                        &inner.counters.successful_without_retry
                    } else {
                        &inner.counters.successful_with_retry
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    metrics::record_retry(&inner.name, target, operation, attempt, "success");
                    return Ok(value);
                }
                Err(error) => error,
            };

            let retryable = (inner.retry_on)(&error);
            if !retryable || attempt >= inner.max_attempts {
                let counter = if attempt == 1 {
                    &inner.counters.failed_without_retry
                } else {
                    &inner.counters.failed_with_retry
                };
                counter.fetch_add(1, Ordering::Relaxed);
                metrics::record_retry(&inner.name, target, operation, attempt, "failure");

                if retryable {
                    tracing::warn!(
                        retry = %inner.name,
                        operation = %operation,
                        attempts = attempt,
                        error = %error,
                        "Retries exhausted"
                    );
                }
                return Err(error);
            }

            let delay = calculate_backoff(attempt, inner.base_delay, inner.max_delay);
            tracing::debug!(
                retry = %inner.name,
                operation = %operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Wrapper for Retry {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        let retry = self.clone();
        let target = target.clone();
        let operation = operation.name().to_string();

        Callable::new(move |args: Args| {
            let retry = retry.clone();
            let call = call.clone();
            let target = target.clone();
            let operation = operation.clone();
            async move { retry.execute(&call, args, &target, &operation).await }
        })
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.inner.name)
            .field("max_attempts", &self.inner.max_attempts)
            .field("base_delay", &self.inner.base_delay)
            .field("max_delay", &self.inner.max_delay)
            .finish()
    }
}

/// Builder for [`Retry`].
pub struct RetryBuilder {
    name: String,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_on: Option<RetryPredicate>,
}

impl RetryBuilder {
    /// Total attempts including the first; values below 1 are treated as 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Only retry errors satisfying `predicate`.
    pub fn retry_on<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&CallError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> Retry {
        let retry_on: RetryPredicate = match self.retry_on {
            Some(predicate) => predicate,
            None => Arc::new(is_retryable_by_default),
        };
        Retry {
            inner: Arc::new(RetryInner {
                name: self.name,
                max_attempts: self.max_attempts,
                base_delay: self.base_delay,
                max_delay: self.max_delay.max(self.base_delay),
                retry_on,
                counters: Counters::default(),
            }),
        }
    }
}

fn is_retryable_by_default(error: &CallError) -> bool {
    !matches!(
        error,
        CallError::FallbackConfig { .. } | CallError::UnknownOperation(_)
    )
}
