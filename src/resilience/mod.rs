//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call through a decorated operation (typical order):
//!     → retries.rs (re-invoke on failure with backoff.rs delays)
//!     → circuit_breaker.rs (fail fast while the remote looks down)
//!     → rate_limit.rs (token bucket permit)
//!     → timeouts.rs (deadline for the inner call)
//!     → bulkhead.rs (bounded concurrency)
//!     → remote call
//! ```
//!
//! # Design Decisions
//! - Every primitive is a cheap-clone handle over shared state
//! - Every primitive implements `Wrapper`; the order is chosen at registration
//! - Rejections are ordinary `CallError`s, visible to retries and fallbacks above
//! - Any `tower` layer can join the chain through `TowerLayer`

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;
pub mod tower_layer;

pub use bulkhead::{Bulkhead, BulkheadBuilder};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerMetrics, CircuitState};
pub use rate_limit::{RateLimiter, RateLimiterBuilder};
pub use retries::{Retry, RetryBuilder, RetryMetrics};
pub use timeouts::TimeLimiter;
pub use tower_layer::{CallService, TowerLayer};
