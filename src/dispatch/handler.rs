//! Invocation dispatcher.
//!
//! # Responsibilities
//! - Route identity operations to the target identity
//! - Route pass-through defaults straight to their definition
//! - Route everything else through its decorated callable
//!
//! # Design Decisions
//! - Holds only immutable state; no synchronization on the call path
//! - A missing decorated callable is an invariant violation: logged at error
//!   level and counted, then the call is delegated to the remote directly

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use serde_json::Value;

use crate::callable::{Args, CallFuture};
use crate::contract::{CallContract, IdentityOp, OperationKind, RemoteCall, TargetIdentity};
use crate::decorators::DecoratedCallables;
use crate::dispatch::ResilientClient;
use crate::error::CallError;
use crate::observability::metrics;

/// The single interception point for all calls against a contract.
pub struct InvocationHandler {
    target: TargetIdentity,
    contract: Arc<CallContract>,
    remote: Arc<dyn RemoteCall>,
    decorated: DecoratedCallables,
}

impl InvocationHandler {
    pub(crate) fn new(
        target: TargetIdentity,
        contract: Arc<CallContract>,
        remote: Arc<dyn RemoteCall>,
        decorated: DecoratedCallables,
    ) -> Self {
        Self {
            target,
            contract,
            remote,
            decorated,
        }
    }

    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    pub fn contract(&self) -> &Arc<CallContract> {
        &self.contract
    }

    /// Number of decorated callables held.
    pub fn decorated_len(&self) -> usize {
        self.decorated.len()
    }

    pub fn is_decorated(&self, operation: &str) -> bool {
        self.decorated.contains_key(operation)
    }

    /// Dispatch one call of `operation` made through `client`.
    pub fn invoke(&self, client: &ResilientClient, operation: &str, args: Args) -> CallFuture {
        let Some(op) = self.contract.operation(operation) else {
            return future::ready(Err(CallError::UnknownOperation(operation.to_string()))).boxed();
        };

        match op.kind() {
            OperationKind::Identity(identity) => future::ready(Ok(self.identity(*identity, &args))).boxed(),
            OperationKind::Default(handler) => handler.call(client.clone(), args),
            OperationKind::Remote => match self.decorated.get(operation) {
                Some(call) => call.call(args),
                None => {
                    tracing::error!(
                        target_identity = %self.target,
                        operation = %operation,
                        "No decorated callable for remote operation; delegating without decoration"
                    );
                    metrics::record_undecorated_dispatch(&self.target, operation);
                    self.remote.invoke(op, args)
                }
            },
        }
    }

    fn identity(&self, op: IdentityOp, args: &Args) -> Value {
        match op {
            IdentityOp::Equals => {
                let equal = args
                    .first()
                    .filter(|other| !other.is_null())
                    .and_then(|other| serde_json::from_value::<TargetIdentity>(other.clone()).ok())
                    .is_some_and(|other| other == self.target);
                Value::Bool(equal)
            }
            IdentityOp::HashCode => Value::from(self.target.hash_code()),
            IdentityOp::ToString => Value::String(self.target.to_string()),
        }
    }
}

impl fmt::Debug for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandler")
            .field("target", &self.target)
            .field("decorated", &self.decorated.len())
            .finish()
    }
}
