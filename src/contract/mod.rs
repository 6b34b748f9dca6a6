//! Call contract subsystem.
//!
//! # Data Flow
//! ```text
//! CallContract::builder(name)
//!     → operation.rs (remote / default operations, by signature)
//!     → implicit identity operations (equals, hash_code, to_string)
//!     → CallContract (immutable, shared via Arc)
//!
//! At call time:
//!     remote.rs    RemoteCall performs the innermost invocation
//!     object.rs    ServiceObject answers fallback invocations by signature
//!     target.rs    TargetIdentity answers identity operations
//! ```
//!
//! # Design Decisions
//! - Operations are enumerated once, statically; no runtime introspection
//! - Operation names are unique within a contract (no overloading)
//! - Shape checks are structural, by signature

pub mod object;
pub mod operation;
pub mod remote;
pub mod target;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub use object::{ServiceImpl, ServiceImplBuilder, ServiceObject};
pub use operation::{DefaultHandler, IdentityOp, Operation, OperationKind, Signature};
pub use remote::{remote_fn, FnRemote, RemoteCall};
pub use target::TargetIdentity;

use crate::callable::{Args, CallResult};
use crate::dispatch::ResilientClient;
use crate::error::BuildError;

/// Abstract description of a service: a named set of operations.
#[derive(Debug)]
pub struct CallContract {
    name: String,
    operations: Vec<Operation>,
    index: HashMap<String, usize>,
}

impl CallContract {
    pub fn builder(name: impl Into<String>) -> CallContractBuilder {
        CallContractBuilder {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Contract type identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All operations, identity operations last.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.index.get(name).map(|&i| &self.operations[i])
    }

    /// Operations delegated to the remote collaborator.
    pub fn remote_operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_remote())
    }

    /// Signatures of remote operations `object` does not expose.
    ///
    /// Empty when the object structurally satisfies the contract.
    pub fn missing_from(&self, object: &dyn ServiceObject) -> Vec<String> {
        self.remote_operations()
            .filter(|op| !object.implements(op.signature()))
            .map(|op| op.signature().to_string())
            .collect()
    }
}

/// Builder for [`CallContract`].
pub struct CallContractBuilder {
    name: String,
    operations: Vec<Operation>,
}

impl CallContractBuilder {
    /// Declare any operation.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Declare an operation delegated to the remote collaborator.
    pub fn remote(self, signature: Signature) -> Self {
        self.operation(Operation::remote(signature))
    }

    /// Declare an operation with a self-contained definition.
    pub fn default_operation<F, Fut>(self, signature: Signature, f: F) -> Self
    where
        F: Fn(ResilientClient, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.operation(Operation::default_method(signature, f))
    }

    /// Validate names and append the identity operations.
    pub fn build(self) -> Result<Arc<CallContract>, BuildError> {
        let mut operations = self.operations;
        let mut index = HashMap::with_capacity(operations.len() + IdentityOp::ALL.len());

        for (i, op) in operations.iter().enumerate() {
            if IdentityOp::ALL.iter().any(|id| id.name() == op.name()) {
                return Err(BuildError::ReservedOperation(op.name().to_string()));
            }
            if index.insert(op.name().to_string(), i).is_some() {
                return Err(BuildError::DuplicateOperation(op.name().to_string()));
            }
        }

        for id in IdentityOp::ALL {
            index.insert(id.name().to_string(), operations.len());
            operations.push(Operation::identity(id));
        }

        Ok(Arc::new(CallContract {
            name: self.name,
            operations,
            index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn greeting() -> Signature {
        Signature::new("greeting").returns("String")
    }

    #[test]
    fn test_identity_operations_are_implicit() {
        let contract = CallContract::builder("GreetingService")
            .remote(greeting())
            .build()
            .unwrap();

        assert_eq!(contract.operations().len(), 4);
        assert!(contract.operation("equals").unwrap().is_identity_sensitive());
        assert!(contract.operation("hash_code").unwrap().is_identity_sensitive());
        assert!(contract.operation("to_string").unwrap().is_identity_sensitive());
        assert_eq!(contract.remote_operations().count(), 1);
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let result = CallContract::builder("GreetingService")
            .remote(greeting())
            .remote(greeting().param("String"))
            .build();

        assert!(matches!(result, Err(BuildError::DuplicateOperation(name)) if name == "greeting"));
    }

    #[test]
    fn test_reserved_operation_rejected() {
        let result = CallContract::builder("GreetingService")
            .remote(Signature::new("to_string").returns("String"))
            .build();

        assert!(matches!(result, Err(BuildError::ReservedOperation(_))));
    }

    #[test]
    fn test_missing_from_lists_unimplemented_signatures() {
        let contract = CallContract::builder("GreetingService")
            .remote(greeting())
            .remote(Signature::new("greeting_with_name").param("String").returns("String"))
            .default_operation(Signature::new("default_greeting").returns("String"), |_c, _a| async {
                Ok(Value::Null)
            })
            .build()
            .unwrap();

        let partial = ServiceImpl::builder("PartialFallback")
            .handle(greeting(), |_args: Args| async { Ok(Value::from("fallback")) })
            .build();

        assert_eq!(
            contract.missing_from(&partial),
            vec!["greeting_with_name(String) -> String".to_string()]
        );
    }
}
