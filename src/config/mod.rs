//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → builder.rs (DecoratorsBuilder::from_config, enabled sections in order)
//! ```
//!
//! # Design Decisions
//! - Config is read once, when decorators are built; clients never reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod builder;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BulkheadConfig, CircuitBreakerConfig, ObservabilityConfig, RateLimiterConfig, ResilienceConfig, RetryConfig,
    StageKind, TimeLimiterConfig,
};
pub use validation::{validate_config, ValidationError};
