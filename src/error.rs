//! Error types shared by every layer of a decorated call.
//!
//! # Error Kinds
//! ```text
//! Remote ─┬─ RemoteClient (status 4xx)      Rejected ─┬─ CircuitOpen
//!         └─ RemoteServer (status 5xx)                ├─ RateLimited
//! Timeout   FallbackConfig   UnknownOperation         └─ BulkheadFull
//! Application
//! ```
//!
//! # Design Decisions
//! - Errors pass through every layer verbatim; no layer wraps another's error
//! - Kinds form a closed hierarchy so selectors can match "a kind and its subtypes"
//! - Application errors are kept behind an `Arc` so identity survives cloning

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error raised by the remote call collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote call failed: {message}")]
pub struct RemoteError {
    status: Option<u16>,
    message: String,
}

impl RemoteError {
    /// Create a remote error without a status code (e.g. connection failure).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create a remote error carrying a response status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify by status: 4xx client errors, 5xx server errors.
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            Some(400..=499) => ErrorKind::RemoteClient,
            Some(500..=599) => ErrorKind::RemoteServer,
            _ => ErrorKind::Remote,
        }
    }
}

/// Error produced anywhere along a decorated call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The remote collaborator failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A circuit breaker refused the call.
    #[error("circuit breaker '{name}' is OPEN and does not permit further calls")]
    CircuitOpen { name: String },

    /// A rate limiter refused the call.
    #[error("rate limiter '{name}' does not permit further calls")]
    RateLimited { name: String },

    /// A concurrency limiter refused the call.
    #[error("bulkhead '{name}' is full and does not permit further calls")]
    BulkheadFull { name: String },

    /// A time limiter gave up waiting for the call.
    #[error("time limiter '{name}' timed out")]
    Timeout {
        name: String,
        after: Option<Duration>,
    },

    /// A resolved fallback does not satisfy the call contract.
    #[error("Cannot use the fallback [{fallback}] for [{contract}]: missing {}", .missing.join(", "))]
    FallbackConfig {
        fallback: String,
        contract: String,
        missing: Vec<String>,
    },

    /// The operation is not declared on the call contract.
    #[error("operation '{0}' is not declared on the call contract")]
    UnknownOperation(String),

    /// Any other error, raised by application code or a custom wrapper.
    #[error(transparent)]
    Application(Arc<dyn StdError + Send + Sync>),
}

impl CallError {
    /// Wrap an arbitrary error.
    pub fn application<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        CallError::Application(Arc::new(error))
    }

    /// The most specific kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Remote(e) => e.kind(),
            CallError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            CallError::RateLimited { .. } => ErrorKind::RateLimited,
            CallError::BulkheadFull { .. } => ErrorKind::BulkheadFull,
            CallError::Timeout { .. } => ErrorKind::Timeout,
            CallError::FallbackConfig { .. } => ErrorKind::FallbackConfig,
            CallError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            CallError::Application(_) => ErrorKind::Application,
        }
    }

    /// Return true if this error is of `kind` or one of its subtypes.
    pub fn is(&self, kind: ErrorKind) -> bool {
        kind.includes(self.kind())
    }

    /// Typed access to an application error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            CallError::Application(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Closed hierarchy of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Remote,
    RemoteClient,
    RemoteServer,
    Rejected,
    CircuitOpen,
    RateLimited,
    BulkheadFull,
    Timeout,
    FallbackConfig,
    UnknownOperation,
    Application,
}

impl ErrorKind {
    /// The direct parent kind, if any.
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::RemoteClient | ErrorKind::RemoteServer => Some(ErrorKind::Remote),
            ErrorKind::CircuitOpen | ErrorKind::RateLimited | ErrorKind::BulkheadFull => {
                Some(ErrorKind::Rejected)
            }
            _ => None,
        }
    }

    /// Return true if `other` is this kind or a descendant of it.
    pub fn includes(self, other: ErrorKind) -> bool {
        let mut current = Some(other);
        while let Some(kind) = current {
            if kind == self {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Remote => "remote",
            ErrorKind::RemoteClient => "remote_client",
            ErrorKind::RemoteServer => "remote_server",
            ErrorKind::Rejected => "rejected",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::BulkheadFull => "bulkhead_full",
            ErrorKind::Timeout => "timeout",
            ErrorKind::FallbackConfig => "fallback_config",
            ErrorKind::UnknownOperation => "unknown_operation",
            ErrorKind::Application => "application",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors detected while building a contract or a client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No remote call collaborator was configured.
    #[error("a remote call collaborator must be configured before building a client")]
    MissingRemote,

    /// A statically registered fallback does not satisfy the contract.
    #[error("invalid fallback: {0}")]
    InvalidFallback(CallError),

    /// Two operations share a name.
    #[error("operation '{0}' is declared more than once")]
    DuplicateOperation(String),

    /// An operation uses a name reserved for identity operations.
    #[error("operation name '{0}' is reserved for identity operations")]
    ReservedOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("inventory exhausted")]
    struct InventoryExhausted;

    #[test]
    fn test_remote_kind_by_status() {
        assert_eq!(RemoteError::new("reset").kind(), ErrorKind::Remote);
        assert_eq!(RemoteError::with_status(404, "missing").kind(), ErrorKind::RemoteClient);
        assert_eq!(RemoteError::with_status(503, "down").kind(), ErrorKind::RemoteServer);
    }

    #[test]
    fn test_kind_hierarchy() {
        assert!(ErrorKind::Remote.includes(ErrorKind::RemoteServer));
        assert!(ErrorKind::Rejected.includes(ErrorKind::CircuitOpen));
        assert!(ErrorKind::Timeout.includes(ErrorKind::Timeout));
        assert!(!ErrorKind::RemoteServer.includes(ErrorKind::Remote));
        assert!(!ErrorKind::Rejected.includes(ErrorKind::Timeout));

        let err = CallError::from(RemoteError::with_status(500, "boom"));
        assert!(err.is(ErrorKind::Remote));
        assert!(!err.is(ErrorKind::RemoteClient));
    }

    #[test]
    fn test_error_display() {
        let err = CallError::CircuitOpen { name: "inventory".into() };
        assert_eq!(
            err.to_string(),
            "circuit breaker 'inventory' is OPEN and does not permit further calls"
        );

        let err = CallError::FallbackConfig {
            fallback: "String".into(),
            contract: "GreetingService".into(),
            missing: vec!["greeting() -> String".into()],
        };
        assert!(err
            .to_string()
            .starts_with("Cannot use the fallback [String] for [GreetingService]"));

        let err = CallError::from(RemoteError::with_status(500, "500 Internal Server Error"));
        assert_eq!(err.to_string(), "remote call failed: 500 Internal Server Error");
    }

    #[test]
    fn test_application_downcast() {
        let err = CallError::application(InventoryExhausted);
        assert_eq!(err.kind(), ErrorKind::Application);
        assert!(err.downcast_ref::<InventoryExhausted>().is_some());
        assert!(err.downcast_ref::<RemoteError>().is_none());
        assert_eq!(err.to_string(), "inventory exhausted");
    }
}
