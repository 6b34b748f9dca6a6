//! The caller-facing client and its terminal build.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use serde_json::{json, Value};

use crate::callable::{Args, CallFuture};
use crate::contract::{CallContract, RemoteCall, ServiceObject, Signature, TargetIdentity};
use crate::decorators::{build_chain, Decorators};
use crate::dispatch::InvocationHandler;
use crate::error::{BuildError, CallError};

/// A resilience-decorated client for one call contract.
///
/// Cloning is cheap and yields the same client (same decorated callables,
/// same wrapper state). Equality, hashing and display follow the target identity.
#[derive(Clone)]
pub struct ResilientClient {
    handler: Arc<InvocationHandler>,
}

impl ResilientClient {
    pub fn builder(decorators: Decorators) -> ResilientClientBuilder {
        ResilientClientBuilder {
            decorators,
            remote: None,
        }
    }

    /// Invoke `operation` with `args`.
    pub fn call(&self, operation: &str, args: Args) -> CallFuture {
        self.handler.invoke(self, operation, args)
    }

    pub fn target(&self) -> &TargetIdentity {
        self.handler.target()
    }

    pub fn contract(&self) -> &Arc<CallContract> {
        self.handler.contract()
    }

    pub fn handler(&self) -> &InvocationHandler {
        &self.handler
    }

    /// The target identity as the argument of an `equals` call.
    pub fn identity_value(&self) -> Value {
        json!({
            "contract": self.target().contract(),
            "name": self.target().name(),
        })
    }
}

impl PartialEq for ResilientClient {
    fn eq(&self, other: &Self) -> bool {
        self.target() == other.target()
    }
}

impl Eq for ResilientClient {}

impl Hash for ResilientClient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target().hash(state);
    }
}

impl fmt::Display for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.target(), f)
    }
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("target", self.target())
            .finish()
    }
}

/// A client can stand in as the fallback of another client of the same contract.
impl ServiceObject for ResilientClient {
    fn type_name(&self) -> &str {
        self.contract().name()
    }

    fn implements(&self, signature: &Signature) -> bool {
        self.contract()
            .operation(signature.name())
            .is_some_and(|op| !op.is_identity_sensitive() && op.signature() == signature)
    }

    fn invoke(&self, signature: &Signature, args: Args) -> CallFuture {
        if !self.implements(signature) {
            return future::ready(Err(CallError::UnknownOperation(signature.to_string()))).boxed();
        }
        self.call(signature.name(), args)
    }
}

/// Builder for [`ResilientClient`].
#[derive(Clone)]
pub struct ResilientClientBuilder {
    decorators: Decorators,
    remote: Option<Arc<dyn RemoteCall>>,
}

impl ResilientClientBuilder {
    /// Set the remote call collaborator.
    pub fn remote<R>(self, remote: R) -> Self
    where
        R: RemoteCall + 'static,
    {
        self.shared_remote(Arc::new(remote))
    }

    pub fn shared_remote(mut self, remote: Arc<dyn RemoteCall>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Build a client named after the contract.
    pub fn build(&self, contract: Arc<CallContract>) -> Result<ResilientClient, BuildError> {
        let target = TargetIdentity::of(&contract);
        self.build_for(contract, target)
    }

    /// Build a client with a custom logical name.
    pub fn build_named(
        &self,
        contract: Arc<CallContract>,
        name: impl Into<String>,
    ) -> Result<ResilientClient, BuildError> {
        let target = TargetIdentity::named(&contract, name);
        self.build_for(contract, target)
    }

    fn build_for(&self, contract: Arc<CallContract>, target: TargetIdentity) -> Result<ResilientClient, BuildError> {
        let remote = self.remote.clone().ok_or(BuildError::MissingRemote)?;
        let decorated = build_chain(&contract, &remote, &self.decorators, &target)?;

        tracing::debug!(
            target_identity = %target,
            operations = decorated.len(),
            "Built resilient client"
        );

        Ok(ResilientClient {
            handler: Arc::new(InvocationHandler::new(target, contract, remote, decorated)),
        })
    }
}

impl fmt::Debug for ResilientClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClientBuilder")
            .field("decorators", &self.decorators)
            .field("remote", &self.remote.is_some())
            .finish()
    }
}
