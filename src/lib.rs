//! Resilience decorator composition for remote-call clients.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller
//!       │  client.call("greeting", args)
//!       ▼
//!  ┌──────────────────┐   identity ops (equals / hash_code / to_string)
//!  │  dispatch        │──────────────▶ answered locally from TargetIdentity
//!  │  (handler)       │   default ops
//!  │                  │──────────────▶ run against the client itself
//!  └────────┬─────────┘
//!           │ remote ops: decorated callable, built once per operation
//!           ▼
//!  ┌──────────────────────────────────────────────────────────┐
//!  │ decorators (first registered = outermost)                │
//!  │   instrumentation → retry → circuit breaker → ...        │
//!  │   → fallback resolver → base callable                    │
//!  └────────┬─────────────────────────────────────────────────┘
//!           ▼
//!  ┌──────────────────┐
//!  │ RemoteCall       │  opaque transport
//!  └──────────────────┘
//!
//!  Cross-cutting: config (TOML → DecoratorsBuilder), observability
//!  (tracing + Prometheus metrics), resilience (the wrapper primitives)
//! ```

// Core model
pub mod callable;
pub mod contract;
pub mod error;

// Composition
pub mod decorators;
pub mod dispatch;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use callable::{Args, CallFuture, CallResult, Callable};
pub use config::{load_config, ResilienceConfig};
pub use contract::{remote_fn, CallContract, Operation, RemoteCall, ServiceImpl, ServiceObject, Signature, TargetIdentity};
pub use decorators::{wrapper_fn, Decorators, DecoratorsBuilder, Wrapper};
pub use dispatch::{ResilientClient, ResilientClientBuilder};
pub use error::{BuildError, CallError, ErrorKind, RemoteError};
