//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Decorated calls produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms labelled by client)
//!     → instrument.rs (per-operation outcome and latency, as a wrapper)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Correlation is explicit: every record call takes the `TargetIdentity`
//! - Metrics are cheap; recording without an exporter is a no-op

pub mod instrument;
pub mod logging;
pub mod metrics;

pub use instrument::Instrumented;
pub use logging::init_logging;
pub use metrics::init_metrics;
