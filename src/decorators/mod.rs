//! Decorator registration and composition.
//!
//! # Data Flow
//! ```text
//! Decorators::builder()
//!     → with_retry / with_circuit_breaker / ... (one wrapper stage each)
//!     → with_fallback* (appended to the current fallback stage, or opens one)
//!     → Decorators (ordered stages, cheap to clone)
//!
//! At client build time:
//!     chain.rs folds the stages around each remote operation's base call,
//!     first registered stage outermost
//! ```
//!
//! # Design Decisions
//! - Registration order is execution order, outermost first
//! - Fallbacks are positional: a fallback registered after a wrapper sits inside it
//! - Wrapper instances are shared by every build that uses these decorators

pub mod chain;
pub mod fallback;

use std::fmt;
use std::sync::Arc;

use crate::callable::Callable;
use crate::contract::{Operation, ServiceObject, TargetIdentity};
use crate::error::{CallError, ErrorKind};
use crate::observability::instrument::Instrumented;
use crate::resilience::{Bulkhead, CircuitBreaker, RateLimiter, Retry, TimeLimiter, TowerLayer};

pub use chain::{base_callable, build_chain, DecoratedCallables};
pub use fallback::{ErrorSelector, FallbackCandidate, FallbackProducer, FallbackResolver};

/// A resilience wrapper: returns an equivalent callable with added behavior.
pub trait Wrapper: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Wrap the callable of `operation` for the client identified by `target`.
    ///
    /// Called once per operation when a client is built, never per call.
    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable;
}

/// A [`Wrapper`] backed by a closure.
pub struct FnWrapper<F> {
    name: String,
    f: F,
}

/// Adapt a closure into a [`Wrapper`].
pub fn wrapper_fn<F>(name: impl Into<String>, f: F) -> FnWrapper<F>
where
    F: Fn(Callable, &Operation, &TargetIdentity) -> Callable + Send + Sync + 'static,
{
    FnWrapper { name: name.into(), f }
}

impl<F> Wrapper for FnWrapper<F>
where
    F: Fn(Callable, &Operation, &TargetIdentity) -> Callable + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        (self.f)(call, operation, target)
    }
}

/// One layer of the decorator chain.
#[derive(Clone)]
pub enum Stage {
    Wrapper(Arc<dyn Wrapper>),
    Fallback(Vec<FallbackCandidate>),
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Wrapper(wrapper) => f.debug_tuple("Wrapper").field(&wrapper.name()).finish(),
            Stage::Fallback(candidates) => f.debug_tuple("Fallback").field(&candidates.len()).finish(),
        }
    }
}

/// Ordered set of decorator stages, outermost first.
#[derive(Debug, Clone, Default)]
pub struct Decorators {
    stages: Vec<Stage>,
}

impl Decorators {
    pub fn builder() -> DecoratorsBuilder {
        DecoratorsBuilder::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage labels, outermost first; fallback stages read `fallback`.
    pub fn describe(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| match stage {
                Stage::Wrapper(wrapper) => wrapper.name().to_string(),
                Stage::Fallback(_) => "fallback".to_string(),
            })
            .collect()
    }
}

/// Builder for [`Decorators`].
#[derive(Debug, Default)]
pub struct DecoratorsBuilder {
    stages: Vec<Stage>,
}

impl DecoratorsBuilder {
    pub fn with_retry(self, retry: Retry) -> Self {
        self.with_wrapper(retry)
    }

    pub fn with_circuit_breaker(self, circuit_breaker: CircuitBreaker) -> Self {
        self.with_wrapper(circuit_breaker)
    }

    pub fn with_rate_limiter(self, rate_limiter: RateLimiter) -> Self {
        self.with_wrapper(rate_limiter)
    }

    pub fn with_bulkhead(self, bulkhead: Bulkhead) -> Self {
        self.with_wrapper(bulkhead)
    }

    pub fn with_time_limiter(self, time_limiter: TimeLimiter) -> Self {
        self.with_wrapper(time_limiter)
    }

    /// Register a `tower` layer as a wrapper.
    pub fn with_tower_layer<L>(self, name: impl Into<String>, layer: L) -> Self
    where
        TowerLayer<L>: Wrapper + 'static,
    {
        self.with_wrapper(TowerLayer::new(name, layer))
    }

    /// Register per-operation call metrics at this position.
    pub fn with_instrumentation(self) -> Self {
        self.with_wrapper(Instrumented::new())
    }

    /// Register any wrapper.
    pub fn with_wrapper<W>(self, wrapper: W) -> Self
    where
        W: Wrapper + 'static,
    {
        self.with_shared_wrapper(Arc::new(wrapper))
    }

    /// Register an already shared wrapper.
    pub fn with_shared_wrapper(mut self, wrapper: Arc<dyn Wrapper>) -> Self {
        self.stages.push(Stage::Wrapper(wrapper));
        self
    }

    /// Fallback for all errors.
    pub fn with_fallback<O>(self, fallback: O) -> Self
    where
        O: ServiceObject + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::any(),
            FallbackProducer::instance(fallback),
        ))
    }

    /// Fallback for errors of `kind` and its subtypes.
    pub fn with_fallback_for_kind<O>(self, fallback: O, kind: ErrorKind) -> Self
    where
        O: ServiceObject + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::kind(kind),
            FallbackProducer::instance(fallback),
        ))
    }

    /// Fallback for errors satisfying `predicate`.
    pub fn with_fallback_if<O, P>(self, fallback: O, predicate: P) -> Self
    where
        O: ServiceObject + 'static,
        P: Fn(&CallError) -> bool + Send + Sync + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::predicate(predicate),
            FallbackProducer::instance(fallback),
        ))
    }

    /// Fallback built from the triggering error, for all errors.
    pub fn with_fallback_factory<F, O>(self, factory: F) -> Self
    where
        F: Fn(&CallError) -> O + Send + Sync + 'static,
        O: ServiceObject + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::any(),
            FallbackProducer::factory(factory),
        ))
    }

    /// Fallback built from the triggering error, for errors of `kind`.
    pub fn with_fallback_factory_for_kind<F, O>(self, factory: F, kind: ErrorKind) -> Self
    where
        F: Fn(&CallError) -> O + Send + Sync + 'static,
        O: ServiceObject + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::kind(kind),
            FallbackProducer::factory(factory),
        ))
    }

    /// Fallback built from the triggering error, for errors satisfying `predicate`.
    pub fn with_fallback_factory_if<F, O, P>(self, factory: F, predicate: P) -> Self
    where
        F: Fn(&CallError) -> O + Send + Sync + 'static,
        O: ServiceObject + 'static,
        P: Fn(&CallError) -> bool + Send + Sync + 'static,
    {
        self.with_fallback_candidate(FallbackCandidate::new(
            ErrorSelector::predicate(predicate),
            FallbackProducer::factory(factory),
        ))
    }

    /// Append a candidate; consecutive fallback registrations share one stage.
    pub fn with_fallback_candidate(mut self, candidate: FallbackCandidate) -> Self {
        match self.stages.last_mut() {
            Some(Stage::Fallback(candidates)) => candidates.push(candidate),
            _ => self.stages.push(Stage::Fallback(vec![candidate])),
        }
        self
    }

    pub fn build(self) -> Decorators {
        Decorators {
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ServiceImpl;

    fn noop(name: &str) -> impl Wrapper + 'static {
        wrapper_fn(name.to_string(), |call: Callable, _op: &Operation, _t: &TargetIdentity| call)
    }

    #[test]
    fn test_consecutive_fallbacks_share_a_stage() {
        let decorators = Decorators::builder()
            .with_wrapper(noop("a"))
            .with_fallback(ServiceImpl::builder("F1").build())
            .with_fallback_for_kind(ServiceImpl::builder("F2").build(), ErrorKind::Timeout)
            .with_wrapper(noop("b"))
            .with_fallback(ServiceImpl::builder("F3").build())
            .build();

        assert_eq!(decorators.describe(), vec!["a", "fallback", "b", "fallback"]);
        match &decorators.stages()[1] {
            Stage::Fallback(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected stage: {other:?}"),
        }
    }

    #[test]
    fn test_empty_builder() {
        let decorators = Decorators::builder().build();
        assert!(decorators.is_empty());
    }
}
