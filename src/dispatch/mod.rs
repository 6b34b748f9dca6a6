//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientClient::builder(decorators).remote(r).build(contract)
//!     → decorators::chain (one decorated callable per remote operation)
//!     → InvocationHandler (immutable; owns the map for its lifetime)
//!
//! client.call(op, args)
//!     → handler.rs
//!         identity op  → TargetIdentity (equals / hash_code / to_string)
//!         default op   → its definition, undecorated
//!         remote op    → decorated callable → ... → remote call
//! ```
//!
//! # Design Decisions
//! - Build once, invoke many; the map is never rebuilt or mutated
//! - Concurrent calls need no coordination beyond what the wrappers provide

pub mod client;
pub mod handler;

pub use client::{ResilientClient, ResilientClientBuilder};
pub use handler::InvocationHandler;
