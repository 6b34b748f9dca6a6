//! The remote call collaborator.
//!
//! The transport that maps an operation to a wire request is opaque here;
//! all the core needs is "invoke this operation with these arguments".

use std::future::Future;
use std::marker::PhantomData;

use crate::callable::{Args, CallFuture, CallResult};
use crate::contract::operation::Operation;

/// Performs the actual remote invocation of an operation.
pub trait RemoteCall: Send + Sync {
    fn invoke(&self, operation: &Operation, args: Args) -> CallFuture;
}

/// A [`RemoteCall`] backed by a closure.
pub struct FnRemote<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Adapt a closure into a [`RemoteCall`].
///
/// The returned future must not borrow the operation; clone what you need.
pub fn remote_fn<F, Fut>(f: F) -> FnRemote<F, Fut>
where
    F: Fn(&Operation, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    FnRemote {
        f,
        _future: PhantomData,
    }
}

impl<F, Fut> RemoteCall for FnRemote<F, Fut>
where
    F: Fn(&Operation, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    fn invoke(&self, operation: &Operation, args: Args) -> CallFuture {
        Box::pin((self.f)(operation, args))
    }
}
