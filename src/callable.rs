//! The callable shape shared by every layer of a decorated operation.
//!
//! # Responsibilities
//! - Define the argument/result representation (`serde_json::Value`)
//! - Provide a cheaply clonable, thread-safe async function type
//!
//! # Design Decisions
//! - Calls are async: any layer may suspend (backoff, permits, timers)
//! - Futures are `'static` so a layer can move them across tasks
//! - Cloning a `Callable` shares the underlying function (and its captured state)

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::CallError;

/// Ordered argument list of a single invocation.
pub type Args = Vec<Value>;

/// Outcome of a single invocation.
pub type CallResult = Result<Value, CallError>;

/// Boxed future produced by every layer.
pub type CallFuture = BoxFuture<'static, CallResult>;

/// A shared async function `Args -> Result<Value, CallError>`.
#[derive(Clone)]
pub struct Callable {
    inner: Arc<dyn Fn(Args) -> CallFuture + Send + Sync>,
}

impl Callable {
    /// Wrap an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |args| -> CallFuture { Box::pin(f(args)) }),
        }
    }

    /// Invoke the function.
    pub fn call(&self, args: Args) -> CallFuture {
        (self.inner)(args)
    }

    /// Return true if both handles point at the same function.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").finish_non_exhaustive()
    }
}
