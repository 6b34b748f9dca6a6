//! Semaphore-based concurrency limiter.
//!
//! # Responsibilities
//! - Enforce `max_concurrent_calls` across everything the bulkhead wraps
//! - Let callers wait up to `max_wait_duration` for a slot
//! - Release the slot when the call finishes, fails or is dropped

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::callable::{Args, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;
use crate::observability::metrics;

struct BulkheadInner {
    name: String,
    max_concurrent_calls: usize,
    max_wait: Duration,
    permits: Arc<Semaphore>,
}

/// Bounds the number of in-flight calls.
#[derive(Clone)]
pub struct Bulkhead {
    inner: Arc<BulkheadInner>,
}

impl Bulkhead {
    pub fn builder(name: impl Into<String>) -> BulkheadBuilder {
        BulkheadBuilder {
            name: name.into(),
            max_concurrent_calls: 25,
            max_wait_duration: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.inner.max_concurrent_calls
    }

    pub fn available_concurrent_calls(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Acquire a slot, waiting up to the configured duration.
    ///
    /// The slot is released when the returned permit is dropped.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permits = Arc::clone(&self.inner.permits);
        if self.inner.max_wait.is_zero() {
            return permits.try_acquire_owned().ok();
        }

        match tokio::time::timeout(self.inner.max_wait, permits.acquire_owned()).await {
            Ok(Ok(permit)) => Some(permit),
            _ => None,
        }
    }
}

impl Wrapper for Bulkhead {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        let bulkhead = self.clone();
        let target = target.clone();
        let operation = operation.name().to_string();

        Callable::new(move |args: Args| {
            let bulkhead = bulkhead.clone();
            let call = call.clone();
            let target = target.clone();
            let operation = operation.clone();
            async move {
                let Some(_permit) = bulkhead.acquire().await else {
                    tracing::warn!(
                        bulkhead = %bulkhead.name(),
                        operation = %operation,
                        max_concurrent_calls = bulkhead.max_concurrent_calls(),
                        "Bulkhead full"
                    );
                    metrics::record_bulkhead_rejected(bulkhead.name(), &target, &operation);
                    return Err(CallError::BulkheadFull {
                        name: bulkhead.name().to_string(),
                    });
                };

                metrics::record_bulkhead_available(bulkhead.name(), bulkhead.available_concurrent_calls());
                call.call(args).await
            }
        })
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.inner.name)
            .field("max_concurrent_calls", &self.inner.max_concurrent_calls)
            .field("available", &self.available_concurrent_calls())
            .finish()
    }
}

/// Builder for [`Bulkhead`].
pub struct BulkheadBuilder {
    name: String,
    max_concurrent_calls: usize,
    max_wait_duration: Duration,
}

impl BulkheadBuilder {
    pub fn max_concurrent_calls(mut self, calls: usize) -> Self {
        self.max_concurrent_calls = calls;
        self
    }

    /// Longest a caller waits for a slot; zero rejects immediately.
    pub fn max_wait_duration(mut self, wait: Duration) -> Self {
        self.max_wait_duration = wait;
        self
    }

    pub fn build(self) -> Bulkhead {
        Bulkhead {
            inner: Arc::new(BulkheadInner {
                name: self.name,
                max_concurrent_calls: self.max_concurrent_calls,
                max_wait: self.max_wait_duration,
                permits: Arc::new(Semaphore::new(self.max_concurrent_calls)),
            }),
        }
    }
}
