//! Objects that implement a contract's operations: fallbacks and in-memory services.

use std::collections::HashMap;
use std::future::Future;

use futures_util::future::{self, FutureExt};

use crate::callable::{Args, CallFuture, CallResult, Callable};
use crate::contract::operation::{Operation, Signature};
use crate::contract::remote::RemoteCall;
use crate::error::CallError;

/// An object exposing operations by signature.
///
/// A fallback must implement every remote operation of the contract it
/// stands in for; this is checked structurally by signature.
pub trait ServiceObject: Send + Sync {
    /// Type name used in configuration errors.
    fn type_name(&self) -> &str;

    /// Return true if an operation with exactly this signature is exposed.
    fn implements(&self, signature: &Signature) -> bool;

    /// Invoke the operation with the given arguments.
    fn invoke(&self, signature: &Signature, args: Args) -> CallFuture;
}

/// A handler table keyed by signature.
pub struct ServiceImpl {
    type_name: String,
    handlers: HashMap<Signature, Callable>,
}

impl ServiceImpl {
    pub fn builder(type_name: impl Into<String>) -> ServiceImplBuilder {
        ServiceImplBuilder {
            type_name: type_name.into(),
            handlers: HashMap::new(),
        }
    }
}

impl ServiceObject for ServiceImpl {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn implements(&self, signature: &Signature) -> bool {
        self.handlers.contains_key(signature)
    }

    fn invoke(&self, signature: &Signature, args: Args) -> CallFuture {
        match self.handlers.get(signature) {
            Some(handler) => handler.call(args),
            None => future::ready(Err(CallError::UnknownOperation(signature.to_string()))).boxed(),
        }
    }
}

/// Serves a contract from memory, e.g. as the transport of a test client.
impl RemoteCall for ServiceImpl {
    fn invoke(&self, operation: &Operation, args: Args) -> CallFuture {
        ServiceObject::invoke(self, operation.signature(), args)
    }
}

impl std::fmt::Debug for ServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceImpl")
            .field("type_name", &self.type_name)
            .field("operations", &self.handlers.len())
            .finish()
    }
}

/// Builder for [`ServiceImpl`].
pub struct ServiceImplBuilder {
    type_name: String,
    handlers: HashMap<Signature, Callable>,
}

impl ServiceImplBuilder {
    /// Register the handler for `signature`, replacing any previous one.
    pub fn handle<F, Fut>(mut self, signature: Signature, f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.handlers.insert(signature, Callable::new(f));
        self
    }

    pub fn build(self) -> ServiceImpl {
        ServiceImpl {
            type_name: self.type_name,
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn echo() -> Signature {
        Signature::new("echo").param("String").returns("String")
    }

    #[tokio::test]
    async fn test_invoke_by_signature() {
        let service = ServiceImpl::builder("EchoService")
            .handle(echo(), |args: Args| async move {
                Ok(args.into_iter().next().unwrap_or(Value::Null))
            })
            .build();

        assert!(service.implements(&echo()));
        let result = ServiceObject::invoke(&service, &echo(), vec![json!("hi")]).await;
        assert_eq!(result.unwrap(), json!("hi"));
    }

    #[tokio::test]
    async fn test_unknown_signature() {
        let service = ServiceImpl::builder("EchoService").build();
        let other = Signature::new("echo").param("u64").returns("String");

        assert!(!service.implements(&other));
        let err = ServiceObject::invoke(&service, &other, vec![]).await.unwrap_err();
        assert!(matches!(err, CallError::UnknownOperation(_)));
    }
}
