//! Circuit breaker for remote call protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: remote assumed down, calls fail fast with `CircuitOpen`
//! - Half-Open: a limited number of probe calls decide recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate >= threshold over the last `sliding_window_size` calls
//!                (once at least `minimum_number_of_calls` were recorded)
//! Open → Half-Open: after `wait_duration_in_open_state`
//! Half-Open → Closed: failure rate of the probes below threshold
//! Half-Open → Open: failure rate of the probes at or above threshold
//! ```
//!
//! # Design Decisions
//! - One breaker handle shares its state across every operation it wraps
//! - Fail fast in Open state (the wrapped call is never started)
//! - Probe permits are returned when a probe is cancelled before completing
//! - An outcome only counts in the state period that admitted the call

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::callable::{Args, Callable};
use crate::contract::{Operation, TargetIdentity};
use crate::decorators::Wrapper;
use crate::error::CallError;
use crate::observability::metrics;

type RecordPredicate = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Snapshot of a breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerMetrics {
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub not_permitted_calls: u64,
    /// Outcomes currently in the sliding window.
    pub buffered_calls: usize,
    /// Failure rate in percent, once enough calls were recorded.
    pub failure_rate: Option<f64>,
}

struct Settings {
    failure_rate_threshold: f64,
    sliding_window_size: usize,
    minimum_number_of_calls: usize,
    wait_duration_in_open_state: Duration,
    permitted_calls_in_half_open_state: u32,
}

struct Breaker {
    state: CircuitState,
    /// Closed-state outcomes, `true` for a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    probes_completed: u32,
    probes_failed: u32,
    /// Bumped on every transition; stale outcomes carry an older value.
    generation: u64,
}

/// Who admitted a call: a half-open probe or a closed-state call, and in which period.
#[derive(Debug, Clone, Copy)]
struct Admission {
    half_open: bool,
    generation: u64,
}

struct CircuitBreakerInner {
    name: String,
    settings: Settings,
    record_error: RecordPredicate,
    breaker: Mutex<Breaker>,
    successful: AtomicU64,
    failed: AtomicU64,
    not_permitted: AtomicU64,
}

/// Count-based circuit breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<CircuitBreakerInner>,
}

impl CircuitBreaker {
    pub fn builder(name: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder {
            name: name.into(),
            failure_rate_threshold: 50.0,
            sliding_window_size: 100,
            minimum_number_of_calls: 100,
            wait_duration_in_open_state: Duration::from_secs(60),
            permitted_calls_in_half_open_state: 10,
            record_error: None,
        }
    }

    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn lock(&self) -> MutexGuard<'_, Breaker> {
        self.inner.breaker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state; an expired Open state reads as Half-Open.
    pub fn state(&self) -> CircuitState {
        let mut breaker = self.lock();
        self.refresh(&mut breaker);
        breaker.state
    }

    /// Acquire permission to start a call.
    pub fn try_acquire_permission(&self) -> bool {
        self.admit().is_some()
    }

    fn admit(&self) -> Option<Admission> {
        let mut breaker = self.lock();
        self.refresh(&mut breaker);

        let half_open = match breaker.state {
            CircuitState::Closed => false,
            CircuitState::Open => return None,
            CircuitState::HalfOpen => {
                let used = breaker.probes_in_flight + breaker.probes_completed;
                if used >= self.inner.settings.permitted_calls_in_half_open_state {
                    return None;
                }
                breaker.probes_in_flight += 1;
                true
            }
        };
        Some(Admission {
            half_open,
            generation: breaker.generation,
        })
    }

    /// Record a successful call admitted in the current state.
    pub fn on_success(&self) {
        self.complete(None, false);
    }

    /// Record a failed call admitted in the current state.
    pub fn on_error(&self) {
        self.complete(None, true);
    }

    /// Return a permit whose call never completed.
    pub fn release_permission(&self) {
        self.release(None);
    }

    fn complete(&self, admission: Option<Admission>, failure: bool) {
        let counter = if failure {
            &self.inner.failed
        } else {
            &self.inner.successful
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.record(admission, failure);
    }

    fn release(&self, admission: Option<Admission>) {
        let mut breaker = self.lock();
        if breaker.state == CircuitState::HalfOpen && Self::is_current_half_open_call(&breaker, admission) {
            breaker.probes_in_flight = breaker.probes_in_flight.saturating_sub(1);
        }
    }

    /// `None` stands for a caller that tracks permits itself.
    fn is_current_half_open_call(breaker: &Breaker, admission: Option<Admission>) -> bool {
        admission.map_or(true, |a| a.half_open && a.generation == breaker.generation)
    }

    /// Force the breaker back to Closed with an empty window.
    pub fn reset(&self) {
        let mut breaker = self.lock();
        self.transition(&mut breaker, CircuitState::Closed);
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let breaker = self.lock();
        CircuitBreakerMetrics {
            successful_calls: self.inner.successful.load(Ordering::Relaxed),
            failed_calls: self.inner.failed.load(Ordering::Relaxed),
            not_permitted_calls: self.inner.not_permitted.load(Ordering::Relaxed),
            buffered_calls: breaker.window.len(),
            failure_rate: self.failure_rate(&breaker.window),
        }
    }

    fn failure_rate(&self, window: &VecDeque<bool>) -> Option<f64> {
        if window.is_empty() || window.len() < self.inner.settings.minimum_number_of_calls {
            return None;
        }
        let failures = window.iter().filter(|failed| **failed).count();
        Some(failures as f64 * 100.0 / window.len() as f64)
    }

    fn record(&self, admission: Option<Admission>, failure: bool) {
        let settings = &self.inner.settings;
        let mut breaker = self.lock();

        match breaker.state {
            CircuitState::Closed => {
                if admission.is_some_and(|a| a.generation != breaker.generation) {
                    return;
                }
                breaker.window.push_back(failure);
                while breaker.window.len() > settings.sliding_window_size {
                    breaker.window.pop_front();
                }
                if let Some(rate) = self.failure_rate(&breaker.window) {
                    if rate >= settings.failure_rate_threshold {
                        tracing::warn!(
                            circuit_breaker = %self.inner.name,
                            failure_rate = rate,
                            threshold = settings.failure_rate_threshold,
                            "Failure rate exceeded threshold"
                        );
                        self.transition(&mut breaker, CircuitState::Open);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if !Self::is_current_half_open_call(&breaker, admission) {
                    return;
                }
                breaker.probes_in_flight = breaker.probes_in_flight.saturating_sub(1);
                breaker.probes_completed += 1;
                if failure {
                    breaker.probes_failed += 1;
                }
                if breaker.probes_completed >= settings.permitted_calls_in_half_open_state {
                    let rate = breaker.probes_failed as f64 * 100.0 / breaker.probes_completed as f64;
                    let next = if rate >= settings.failure_rate_threshold {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    self.transition(&mut breaker, next);
                }
            }
            // Outcome of a call started before the circuit opened.
            CircuitState::Open => {}
        }
    }

    fn refresh(&self, breaker: &mut Breaker) {
        if breaker.state != CircuitState::Open {
            return;
        }
        let expired = breaker
            .opened_at
            .map(|at| at.elapsed() >= self.inner.settings.wait_duration_in_open_state)
            .unwrap_or(true);
        if expired {
            self.transition(breaker, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, breaker: &mut Breaker, to: CircuitState) {
        let from = breaker.state;
        breaker.state = to;
        breaker.probes_in_flight = 0;
        breaker.probes_completed = 0;
        breaker.probes_failed = 0;
        breaker.generation += 1;

        match to {
            CircuitState::Open => breaker.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                breaker.window.clear();
                breaker.opened_at = None;
            }
            CircuitState::HalfOpen => {}
        }

        if from != to {
            tracing::warn!(
                circuit_breaker = %self.inner.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state transition"
            );
            metrics::record_circuit_state(&self.inner.name, to);
        }
    }
}

/// Returns an unused half-open permit if the call is dropped mid-flight.
struct PermitGuard {
    breaker: CircuitBreaker,
    admission: Admission,
    completed: bool,
}

impl PermitGuard {
    fn complete(mut self, failure: bool) {
        self.completed = true;
        self.breaker.complete(Some(self.admission), failure);
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.breaker.release(Some(self.admission));
        }
    }
}

impl Wrapper for CircuitBreaker {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn wrap(&self, call: Callable, operation: &Operation, target: &TargetIdentity) -> Callable {
        let breaker = self.clone();
        let target = target.clone();
        let operation = operation.name().to_string();

        Callable::new(move |args: Args| {
            let breaker = breaker.clone();
            let call = call.clone();
            let target = target.clone();
            let operation = operation.clone();
            async move {
                let Some(admission) = breaker.admit() else {
                    breaker.inner.not_permitted.fetch_add(1, Ordering::Relaxed);
                    metrics::record_circuit_call(breaker.name(), &target, &operation, "not_permitted");
                    return Err(CallError::CircuitOpen {
                        name: breaker.name().to_string(),
                    });
                };

                let guard = PermitGuard {
                    breaker: breaker.clone(),
                    admission,
                    completed: false,
                };
                let result = call.call(args).await;
                let failure = match &result {
                    Ok(_) => false,
                    Err(error) => (breaker.inner.record_error)(error),
                };
                guard.complete(failure);
                metrics::record_circuit_call(
                    breaker.name(),
                    &target,
                    &operation,
                    if failure { "failed" } else { "successful" },
                );
                result
            }
        })
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    name: String,
    failure_rate_threshold: f64,
    sliding_window_size: usize,
    minimum_number_of_calls: usize,
    wait_duration_in_open_state: Duration,
    permitted_calls_in_half_open_state: u32,
    record_error: Option<RecordPredicate>,
}

impl CircuitBreakerBuilder {
    /// Failure rate in percent at which the circuit opens.
    pub fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size.max(1);
        self
    }

    /// Capped at the sliding window size.
    pub fn minimum_number_of_calls(mut self, calls: usize) -> Self {
        self.minimum_number_of_calls = calls.max(1);
        self
    }

    pub fn wait_duration_in_open_state(mut self, wait: Duration) -> Self {
        self.wait_duration_in_open_state = wait;
        self
    }

    pub fn permitted_calls_in_half_open_state(mut self, calls: u32) -> Self {
        self.permitted_calls_in_half_open_state = calls.max(1);
        self
    }

    /// Count only errors satisfying `predicate` as failures; others count as successes.
    pub fn record_error<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&CallError) -> bool + Send + Sync + 'static,
    {
        self.record_error = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let record_error: RecordPredicate = match self.record_error {
            Some(predicate) => predicate,
            None => Arc::new(|_: &CallError| true),
        };
        let settings = Settings {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_size: self.sliding_window_size,
            minimum_number_of_calls: self.minimum_number_of_calls.min(self.sliding_window_size),
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            permitted_calls_in_half_open_state: self.permitted_calls_in_half_open_state,
        };

        CircuitBreaker {
            inner: Arc::new(CircuitBreakerInner {
                name: self.name,
                breaker: Mutex::new(Breaker {
                    state: CircuitState::Closed,
                    window: VecDeque::with_capacity(settings.sliding_window_size),
                    opened_at: None,
                    probes_in_flight: 0,
                    probes_completed: 0,
                    probes_failed: 0,
                    generation: 0,
                }),
                settings,
                record_error,
                successful: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                not_permitted: AtomicU64::new(0),
            }),
        }
    }
}
