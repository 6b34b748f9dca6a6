//! Token bucket rate limiter.
//!
//! # Responsibilities
//! - Admit at most `limit_for_period` calls per `limit_refresh_period`
//! - Let callers wait up to `timeout_duration` for a permit
//! - Reject with `RateLimited` when no permit arrives in time
//!
//! # Design Decisions
//! - Tokens refill continuously; the bucket holds at most one period's worth
//! - A caller that cannot get a permit within its timeout fails immediately
//!   instead of sleeping for nothing

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::callable::{Args, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;
use crate::observability::metrics;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_rate))
        }
    }
}

struct RateLimiterInner {
    name: String,
    capacity: f64,
    refill_rate: f64,
    timeout: Duration,
    bucket: Mutex<TokenBucket>,
}

/// Limits the call rate of everything it wraps.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    pub fn builder(name: impl Into<String>) -> RateLimiterBuilder {
        RateLimiterBuilder {
            name: name.into(),
            limit_for_period: 50,
            limit_refresh_period: Duration::from_millis(500),
            timeout_duration: Duration::from_secs(5),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Take a permit without waiting.
    pub fn try_acquire_permission(&self) -> bool {
        self.poll_permit().is_ok()
    }

    /// Wait up to the configured timeout for a permit.
    ///
    /// A timeout too large to represent as an instant waits without a deadline.
    pub async fn acquire_permission(&self) -> bool {
        let deadline = Instant::now().checked_add(self.inner.timeout);
        loop {
            match self.poll_permit() {
                Ok(()) => return true,
                Err(wait) => {
                    let past_deadline = deadline.is_some_and(|deadline| {
                        Instant::now().checked_add(wait).map_or(true, |ready| ready > deadline)
                    });
                    if past_deadline {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn poll_permit(&self) -> Result<(), Duration> {
        let mut bucket = self
            .inner
            .bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.try_acquire(self.inner.capacity, self.inner.refill_rate)
    }
}

impl Wrapper for RateLimiter {
    fn name(&self) -> &str {
        &self.inner.name
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
                if !limiter.acquire_permission().await {
                    tracing::warn!(
                        rate_limiter = %limiter.name(),
                        operation = %operation,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited(limiter.name(), &target, &operation);
                    return Err(CallError::RateLimited {
                        name: limiter.name().to_string(),
                    });
                }
                call.call(args).await
            }
        })
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

/// Builder for [`RateLimiter`].
pub struct RateLimiterBuilder {
    name: String,
    limit_for_period: u32,
    limit_refresh_period: Duration,
    timeout_duration: Duration,
}

impl RateLimiterBuilder {
    pub fn limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit.max(1);
        self
    }

    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Longest a caller waits for a permit; zero fails immediately.
    pub fn timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn build(self) -> RateLimiter {
        let capacity = self.limit_for_period as f64;
        let period = self.limit_refresh_period.as_secs_f64().max(f64::EPSILON);
        RateLimiter {
            inner: Arc::new(RateLimiterInner {
                name: self.name,
                capacity,
                refill_rate: capacity / period,
                timeout: self.timeout_duration,
                bucket: Mutex::new(TokenBucket::new(capacity)),
            }),
        }
    }
}
