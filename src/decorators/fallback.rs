//! Fallback resolution.
//!
//! # Responsibilities
//! - Select the first fallback candidate whose selector accepts an error
//! - Produce the fallback instance (static, or from a factory given the error)
//! - Check the instance structurally satisfies the call contract
//! - Invoke the matching operation with the original arguments
//!
//! # Design Decisions
//! - First match wins; later candidates are never consulted once one matched
//! - A fallback's own error propagates unchanged, past every outer resolver
//! - Configuration errors are never resolved by another fallback
//! - Factory products are checked lazily, on the call that needs them

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use crate::callable::{Args, CallResult, Callable};
use crate::contract::{CallContract, Operation, ServiceObject, Signature};
use crate::error::{CallError, ErrorKind};

type Predicate = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

tokio::task_local! {
    /// Set when the innermost resolver's fallback returned the error in flight.
    static FALLBACK_FAILED: Cell<bool>;
}
type Factory = Arc<dyn Fn(&CallError) -> Arc<dyn ServiceObject> + Send + Sync>;

/// Decides whether a candidate handles an error.
#[derive(Clone)]
pub enum ErrorSelector {
    /// Accept all errors.
    Any,
    /// Accept errors of this kind and its subtypes.
    Kind(ErrorKind),
    /// Accept errors satisfying the predicate.
    Predicate(Predicate),
}

impl ErrorSelector {
    pub fn any() -> Self {
        ErrorSelector::Any
    }

    pub fn kind(kind: ErrorKind) -> Self {
        ErrorSelector::Kind(kind)
    }

    pub fn predicate<P>(predicate: P) -> Self
    where
        P: Fn(&CallError) -> bool + Send + Sync + 'static,
    {
        ErrorSelector::Predicate(Arc::new(predicate))
    }

    /// Accept application errors of concrete type `E`.
    pub fn of_type<E>() -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::predicate(|error| error.downcast_ref::<E>().is_some())
    }

    pub fn accepts(&self, error: &CallError) -> bool {
        match self {
            ErrorSelector::Any => true,
            ErrorSelector::Kind(kind) => error.is(*kind),
            ErrorSelector::Predicate(predicate) => predicate(error),
        }
    }
}

impl fmt::Debug for ErrorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSelector::Any => f.write_str("Any"),
            ErrorSelector::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            ErrorSelector::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// Produces the fallback instance for an accepted error.
#[derive(Clone)]
pub enum FallbackProducer {
    Instance(Arc<dyn ServiceObject>),
    Factory(Factory),
}

impl FallbackProducer {
    pub fn instance<O>(fallback: O) -> Self
    where
        O: ServiceObject + 'static,
    {
        FallbackProducer::Instance(Arc::new(fallback))
    }

    /// A factory receiving the triggering error.
    pub fn factory<F, O>(factory: F) -> Self
    where
        F: Fn(&CallError) -> O + Send + Sync + 'static,
        O: ServiceObject + 'static,
    {
        FallbackProducer::Factory(Arc::new(move |error| -> Arc<dyn ServiceObject> {
            Arc::new(factory(error))
        }))
    }

    pub fn produce(&self, error: &CallError) -> Arc<dyn ServiceObject> {
        match self {
            FallbackProducer::Instance(instance) => Arc::clone(instance),
            FallbackProducer::Factory(factory) => factory(error),
        }
    }
}

impl fmt::Debug for FallbackProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackProducer::Instance(instance) => {
                f.debug_tuple("Instance").field(&instance.type_name()).finish()
            }
            FallbackProducer::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// A selector paired with a producer.
#[derive(Debug, Clone)]
pub struct FallbackCandidate {
    selector: ErrorSelector,
    producer: FallbackProducer,
}

impl FallbackCandidate {
    pub fn new(selector: ErrorSelector, producer: FallbackProducer) -> Self {
        Self { selector, producer }
    }
}

/// Resolves errors against an ordered candidate list for one contract.
#[derive(Debug)]
pub struct FallbackResolver {
    candidates: Vec<FallbackCandidate>,
    contract: Arc<CallContract>,
}

impl FallbackResolver {
    pub fn new(candidates: Vec<FallbackCandidate>, contract: Arc<CallContract>) -> Self {
        Self {
            candidates,
            contract,
        }
    }

    /// Check every static instance against the contract.
    pub fn validate_static(&self) -> Result<(), CallError> {
        self.candidates
            .iter()
            .filter_map(|candidate| match &candidate.producer {
                FallbackProducer::Instance(instance) => Some(instance),
                FallbackProducer::Factory(_) => None,
            })
            .try_for_each(|instance| self.check(instance.as_ref()))
    }

    fn check(&self, fallback: &dyn ServiceObject) -> Result<(), CallError> {
        let missing = self.contract.missing_from(fallback);
        if missing.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            fallback = %fallback.type_name(),
            contract = %self.contract.name(),
            missing = ?missing,
            "Fallback does not satisfy the call contract"
        );
        Err(CallError::FallbackConfig {
            fallback: fallback.type_name().to_string(),
            contract: self.contract.name().to_string(),
            missing,
        })
    }

    /// Substitute a fallback result for `error`, or return `error` unchanged.
    pub async fn resolve(&self, error: CallError, signature: &Signature, args: Args) -> CallResult {
        if matches!(error, CallError::FallbackConfig { .. }) {
            return Err(error);
        }

        let Some(candidate) = self.candidates.iter().find(|c| c.selector.accepts(&error)) else {
            return Err(error);
        };

        let fallback = candidate.producer.produce(&error);
        self.check(fallback.as_ref())?;

        tracing::debug!(
            operation = %signature.name(),
            fallback = %fallback.type_name(),
            error_kind = %error.kind(),
            "Resolving call with fallback"
        );
        let result = FALLBACK_FAILED
            .scope(Cell::new(false), fallback.invoke(signature, args))
            .await;
        if result.is_err() {
            let _ = FALLBACK_FAILED.try_with(|failed| failed.set(true));
        }
        result
    }

    /// Guard `call` so its errors go through this resolver.
    pub fn guard(self: &Arc<Self>, call: Callable, operation: &Operation) -> Callable {
        let resolver = Arc::clone(self);
        let signature = operation.signature().clone();

        Callable::new(move |args: Args| {
            let resolver = Arc::clone(&resolver);
            let signature = signature.clone();
            let call = call.clone();
            async move {
                let attempt = async {
                    let _ = FALLBACK_FAILED.try_with(|failed| failed.set(false));
                    match call.call(args.clone()).await {
                        Ok(value) => Ok(value),
                        Err(error) if FALLBACK_FAILED.try_with(Cell::get).unwrap_or(false) => {
                            Err(error)
                        }
                        Err(error) => resolver.resolve(error, &signature, args).await,
                    }
                };

                if FALLBACK_FAILED.try_with(|_| ()).is_ok() {
                    attempt.await
                } else {
                    FALLBACK_FAILED.scope(Cell::new(false), attempt).await
                }
            }
        })
    }
}
