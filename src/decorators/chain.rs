//! Decorator chain builder.
//!
//! # Data Flow
//! ```text
//! for each remote operation:
//!     base      = args → remote.invoke(op, args)
//!     decorated = stage[0](stage[1](... stage[n-1](base)))
//!     map[op]   = decorated
//! ```
//!
//! # Design Decisions
//! - Runs once per client build; stateful wrappers are shared across calls
//! - One resolver per fallback stage, shared by all operations of the client
//! - Static fallback instances are checked here, before any call is made

use std::collections::HashMap;
use std::sync::Arc;

use crate::callable::{Args, Callable};
use crate::contract::{CallContract, Operation, RemoteCall, TargetIdentity};
use crate::decorators::{Decorators, FallbackResolver, Stage};
use crate::error::BuildError;

/// Decorated callable per remote operation, keyed by operation name.
pub type DecoratedCallables = HashMap<String, Callable>;

/// The innermost callable of `operation`: a direct remote invocation.
pub fn base_callable(remote: Arc<dyn RemoteCall>, operation: &Operation) -> Callable {
    let operation = operation.clone();
    Callable::new(move |args: Args| remote.invoke(&operation, args))
}

/// Compose every stage around every remote operation of `contract`.
pub fn build_chain(
    contract: &Arc<CallContract>,
    remote: &Arc<dyn RemoteCall>,
    decorators: &Decorators,
    target: &TargetIdentity,
) -> Result<DecoratedCallables, BuildError> {
    // 1. One resolver per fallback stage, validated eagerly
    let mut resolvers = HashMap::new();
    for (index, stage) in decorators.stages().iter().enumerate() {
        if let Stage::Fallback(candidates) = stage {
            let resolver = FallbackResolver::new(candidates.clone(), Arc::clone(contract));
            resolver.validate_static().map_err(BuildError::InvalidFallback)?;
            resolvers.insert(index, Arc::new(resolver));
        }
    }

    // 2. Fold stages last-to-first so the first registered is outermost
    let mut decorated = DecoratedCallables::new();
    for operation in contract.remote_operations() {
        let base = base_callable(Arc::clone(remote), operation);
        let call = decorators
            .stages()
            .iter()
            .enumerate()
            .rev()
            .fold(base, |call, (index, stage)| match stage {
                Stage::Wrapper(wrapper) => wrapper.wrap(call, operation, target),
                Stage::Fallback(_) => match resolvers.get(&index) {
                    Some(resolver) => resolver.guard(call, operation),
                    None => call,
                },
            });

        tracing::debug!(
            target_identity = %target,
            operation = %operation.name(),
            stages = ?decorators.describe(),
            "Decorated operation"
        );
        decorated.insert(operation.name().to_string(), call);
    }

    Ok(decorated)
}
