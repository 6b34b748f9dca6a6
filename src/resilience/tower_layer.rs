//! Adapter running a `tower` layer as a wrapper.
//!
//! Any layer whose service speaks `Args -> Value` can sit in a decorator
//! chain, e.g. `ConcurrencyLimitLayer`, `TimeoutLayer` or `LoadShedLayer`.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde_json::Value;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::callable::{Args, CallFuture, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;

/// The inner callable exposed as a `tower::Service`.
#[derive(Clone)]
pub struct CallService {
    call: Callable,
}

impl CallService {
    pub fn new(call: Callable) -> Self {
        Self { call }
    }
}

impl Service<Args> for CallService {
    type Response = Value;
    type Error = CallError;
    type Future = CallFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, args: Args) -> Self::Future {
        self.call.call(args)
    }
}

/// Wraps every operation with a fresh service stack built by `layer`.
pub struct TowerLayer<L> {
    name: String,
    layer: L,
}

impl<L> TowerLayer<L> {
    pub fn new(name: impl Into<String>, layer: L) -> Self {
        Self {
            name: name.into(),
            layer,
        }
    }
}

impl<L, S> Wrapper for TowerLayer<L>
where
    L: Layer<CallService, Service = S> + Send + Sync + 'static,
    S: Service<Args, Response = Value> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(&self, call: Callable, _operation: &Operation, _target: &TargetIdentity) -> Callable {
        let service = Arc::new(Mutex::new(self.layer.layer(CallService::new(call))));
        let name = self.name.clone();

        Callable::new(move |args: Args| {
            let svc = service
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            let name = name.clone();
            async move {
                svc.oneshot(args)
                    .await
                    .map_err(|error| map_tower_error(&name, error.into()))
            }
        })
    }
}

impl<L> fmt::Debug for TowerLayer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TowerLayer").field("name", &self.name).finish()
    }
}

/// Map tower's errors onto call errors; inner call errors pass through unchanged.
fn map_tower_error(name: &str, error: BoxError) -> CallError {
    let error = match error.downcast::<CallError>() {
        Ok(call_error) => return *call_error,
        Err(other) => other,
    };

    if error.is::<tower::timeout::error::Elapsed>() {
        CallError::Timeout {
            name: name.to_string(),
            after: None,
        }
    } else if error.is::<tower::load_shed::error::Overloaded>() {
        CallError::BulkheadFull {
            name: name.to_string(),
        }
    } else {
        CallError::Application(Arc::from(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Signature;
    use crate::error::RemoteError;
    use serde_json::json;
    use std::time::Duration;
    use tower::limit::ConcurrencyLimitLayer;
    use tower::timeout::TimeoutLayer;

    fn wrap<L>(layer: TowerLayer<L>, call: Callable) -> Callable
    where
        TowerLayer<L>: Wrapper,
    {
        layer.wrap(
            call,
            &Operation::remote(Signature::new("greeting")),
            &TargetIdentity::new("GreetingService", "greetings"),
        )
    }

    #[tokio::test]
    async fn test_call_errors_pass_through() {
        let failing = Callable::new(|_args: Args| async {
            Err::<Value, _>(CallError::from(RemoteError::with_status(502, "bad gateway")))
        });
        let call = wrap(TowerLayer::new("limit", ConcurrencyLimitLayer::new(2)), failing);

        match call.call(vec![]).await {
            Err(CallError::Remote(e)) => assert_eq!(e.status(), Some(502)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_maps_to_timeout() {
        let slow = Callable::new(|_args: Args| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(json!("late"))
        });
        let call = wrap(
            TowerLayer::new("deadline", TimeoutLayer::new(Duration::from_millis(10))),
            slow,
        );

        let err = call.call(vec![]).await.unwrap_err();
        assert!(matches!(err, CallError::Timeout { name, .. } if name == "deadline"));
    }
}
