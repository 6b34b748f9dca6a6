//! Per-operation call instrumentation as a wrapper.

use tokio::time::Instant;

use crate::callable::{Args, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::observability::metrics;

/// Records call counts, outcomes and latency for every operation it wraps.
///
/// Registered outermost it sees what the caller sees; registered innermost
/// it sees every remote attempt.
#[derive(Debug, Clone)]
pub struct Instrumented {
    name: String,
}

impl Instrumented {
    pub fn new() -> Self {
        Self {
            name: "instrumentation".to_string(),
        }
    }
}

impl Default for Instrumented {
    fn default() -> Self {
        Self::new()
    }
}

impl Wrapper for Instrumented {
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        let target = target.clone();
        let operation = operation.name().to_string();

        Callable::new(move |args: Args| {
            let call = call.clone();
            let target = target.clone();
            let operation = operation.clone();
            async move {
                let start = Instant::now();
                let result = call.call(args).await;
                match &result {
                    Ok(_) => metrics::record_call(&target, &operation, "success", start),
                    Err(error) => {
                        tracing::debug!(
                            client = %target.name(),
                            operation = %operation,
                            error_kind = %error.kind(),
                            error = %error,
                            "Call failed"
                        );
                        metrics::record_call(&target, &operation, error.kind().as_str(), start);
                    }
                }
                result
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Signature;
    use crate::error::{CallError, RemoteError};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn greeting() -> Operation {
        Operation::remote(Signature::new("greeting").returns("String"))
    }

    fn target() -> TargetIdentity {
        TargetIdentity::new("GreetingService", "greetings")
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_passes_through_on_the_runtime_clock() {
        let slow = Callable::new(|_args: Args| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<Value, CallError>(json!("late hello"))
        });
        let wrapped = Instrumented::new().wrap(slow, &greeting(), &target());

        let start = Instant::now();
        assert_eq!(wrapped.call(Vec::new()).await.unwrap(), json!("late hello"));
        assert_eq!(start.elapsed(), Duration::from_secs(3600));

        let failing = Callable::new(|_args: Args| async {
            Err::<Value, _>(CallError::from(RemoteError::with_status(503, "down")))
        });
        let wrapped = Instrumented::new().wrap(failing, &greeting(), &target());
        let err = wrapped.call(Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "remote call failed: down");
    }
}
