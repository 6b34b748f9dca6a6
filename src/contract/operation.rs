//! Operation descriptors enumerated from a call contract.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::callable::{Args, CallFuture, CallResult};
use crate::dispatch::ResilientClient;

/// Structural description of an operation: name, parameter types, return type.
///
/// Two signatures are equal when all three parts are equal; this is what a
/// fallback must match to stand in for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    params: Vec<String>,
    returns: String,
}

impl Signature {
    /// A signature with no parameters returning `()`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: "()".to_string(),
        }
    }

    /// Append a parameter type.
    pub fn param(mut self, ty: impl Into<String>) -> Self {
        self.params.push(ty.into());
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = ty.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn return_type(&self) -> &str {
        &self.returns
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params.join(", "), self.returns)
    }
}

/// Operations answered from the client's target identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityOp {
    Equals,
    HashCode,
    ToString,
}

impl IdentityOp {
    pub const ALL: [IdentityOp; 3] = [IdentityOp::Equals, IdentityOp::HashCode, IdentityOp::ToString];

    pub fn name(self) -> &'static str {
        match self {
            IdentityOp::Equals => "equals",
            IdentityOp::HashCode => "hash_code",
            IdentityOp::ToString => "to_string",
        }
    }

    pub fn signature(self) -> Signature {
        match self {
            IdentityOp::Equals => Signature::new("equals").param("any").returns("bool"),
            IdentityOp::HashCode => Signature::new("hash_code").returns("u64"),
            IdentityOp::ToString => Signature::new("to_string").returns("String"),
        }
    }
}

/// Self-contained definition of a pass-through default operation.
///
/// The handler receives the client it was invoked on, so it may call other
/// (decorated) operations of the same contract.
#[derive(Clone)]
pub struct DefaultHandler {
    inner: Arc<dyn Fn(ResilientClient, Args) -> CallFuture + Send + Sync>,
}

impl DefaultHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ResilientClient, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |client, args| -> CallFuture { Box::pin(f(client, args)) }),
        }
    }

    pub fn call(&self, client: ResilientClient, args: Args) -> CallFuture {
        (self.inner)(client, args)
    }
}

impl fmt::Debug for DefaultHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultHandler")
    }
}

/// How the dispatcher routes an operation.
#[derive(Debug, Clone)]
pub enum OperationKind {
    /// Delegated to the remote collaborator through the decorated callable.
    Remote,
    /// Answered by the dispatcher from the target identity.
    Identity(IdentityOp),
    /// Invoked directly, bypassing all decoration.
    Default(DefaultHandler),
}

/// A single operation of a call contract.
#[derive(Debug, Clone)]
pub struct Operation {
    signature: Signature,
    kind: OperationKind,
}

impl Operation {
    /// An operation delegated to the remote collaborator.
    pub fn remote(signature: Signature) -> Self {
        Self {
            signature,
            kind: OperationKind::Remote,
        }
    }

    /// An operation with a self-contained definition.
    pub fn default_method<F, Fut>(signature: Signature, f: F) -> Self
    where
        F: Fn(ResilientClient, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            signature,
            kind: OperationKind::Default(DefaultHandler::new(f)),
        }
    }

    pub(crate) fn identity(op: IdentityOp) -> Self {
        Self {
            signature: op.signature(),
            kind: OperationKind::Identity(op),
        }
    }

    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn is_identity_sensitive(&self) -> bool {
        matches!(self.kind, OperationKind::Identity(_))
    }

    pub fn is_pass_through_default(&self) -> bool {
        matches!(self.kind, OperationKind::Default(_))
    }

    /// True for operations that get a decorated callable.
    pub fn is_remote(&self) -> bool {
        matches!(self.kind, OperationKind::Remote)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.signature, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_signature_equality_is_structural() {
        let a = Signature::new("echo").param("String").returns("String");
        let b = Signature::new("echo").param("String").returns("String");
        let c = Signature::new("echo").param("u64").returns("String");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "echo(String) -> String");
    }

    #[test]
    fn test_operation_flags() {
        let remote = Operation::remote(Signature::new("greeting").returns("String"));
        assert!(remote.is_remote());
        assert!(!remote.is_identity_sensitive());
        assert!(!remote.is_pass_through_default());

        let default = Operation::default_method(Signature::new("ping"), |_client, _args| async {
            Ok(Value::Null)
        });
        assert!(default.is_pass_through_default());
        assert!(!default.is_remote());

        let equals = Operation::identity(IdentityOp::Equals);
        assert!(equals.is_identity_sensitive());
        assert_eq!(equals.name(), "equals");
    }
}
