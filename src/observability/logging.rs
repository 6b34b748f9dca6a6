//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Pick the filter from `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is the binary's call
//! - A second initialization is reported as an error, not a panic

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a registry with an env filter and a fmt layer.
///
/// `default_directives` applies when `RUST_LOG` is unset or invalid,
/// e.g. `"resilient_exchange=debug"`.
pub fn init_logging(default_directives: &str, compact: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);
    if compact {
        registry.with(fmt::layer().compact()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

/// Default directives for a log level from configuration.
pub fn default_directives(level: &str) -> String {
    format!("resilient_exchange={level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "resilient_exchange=debug,warn");
    }
}
