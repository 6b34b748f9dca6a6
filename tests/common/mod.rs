//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use resilient_exchange::callable::{Args, CallFuture, Callable};
use resilient_exchange::contract::{CallContract, Operation, RemoteCall, ServiceImpl, Signature, TargetIdentity};
use resilient_exchange::decorators::Wrapper;
use resilient_exchange::{CallError, RemoteError, ResilientClient};

pub fn greeting() -> Signature {
    Signature::new("greeting").returns("String")
}

pub fn greeting_with_name() -> Signature {
    Signature::new("greeting_with_name").param("String").returns("String")
}

/// Two remote operations and a default that calls `greeting` through the client.
pub fn greeting_contract() -> Arc<CallContract> {
    CallContract::builder("GreetingService")
        .remote(greeting())
        .remote(greeting_with_name())
        .default_operation(
            Signature::new("default_greeting").returns("String"),
            |client: ResilientClient, args: Args| async move { client.call("greeting", args).await },
        )
        .build()
        .unwrap()
}

/// A fallback implementing the whole greeting contract.
pub fn greeting_fallback() -> ServiceImpl {
    ServiceImpl::builder("GreetingFallback")
        .handle(greeting(), |_args| async { Ok(json!("Hello from fallback")) })
        .handle(greeting_with_name(), |args: Args| async move {
            let name = args.first().and_then(Value::as_str).unwrap_or("stranger").to_string();
            Ok(json!(format!("Hello, {name}, from fallback")))
        })
        .build()
}

/// A remote that fails a scripted number of times, then answers.
///
/// Counts invocations and tracks the highest number of concurrent calls.
pub struct ScriptedRemote {
    failures_left: AtomicUsize,
    failure: RemoteError,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    seen_args: Mutex<Vec<Args>>,
}

impl ScriptedRemote {
    pub fn healthy() -> Self {
        Self::failing_times(0)
    }

    pub fn failing() -> Self {
        Self::failing_times(usize::MAX)
    }

    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            failure: RemoteError::with_status(503, "service unavailable"),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            seen_args: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failure(mut self, failure: RemoteError) -> Self {
        self.failure = failure;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_args(&self) -> Vec<Args> {
        self.seen_args.lock().unwrap().clone()
    }
}

impl RemoteCall for ScriptedRemote {
    fn invoke(&self, operation: &Operation, args: Args) -> CallFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_args.lock().unwrap().push(args.clone());

        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let failure = self.failure.clone();
        let delay = self.delay;
        let name = operation.name().to_string();
        let in_flight = Arc::clone(&self.in_flight);
        let max_in_flight = Arc::clone(&self.max_in_flight);

        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if fail {
                return Err(CallError::from(failure));
            }
            match args.first().and_then(Value::as_str) {
                Some(who) => Ok(json!(format!("Hello, {who}"))),
                None => Ok(json!(format!("Hello from {name}"))),
            }
        })
    }
}

/// A wrapper that counts how often it wraps and logs entry/exit of every call.
pub struct CountingWrapper {
    name: String,
    wraps: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl CountingWrapper {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            wraps: Arc::new(AtomicUsize::new(0)),
            log,
        }
    }

    pub fn wraps(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.wraps)
    }
}

impl Wrapper for CountingWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(&self, call: Callable, _operation: &Operation, _target: &TargetIdentity) -> Callable {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        let name = self.name.clone();
        let log = Arc::clone(&self.log);

        Callable::new(move |args: Args| {
            let call = call.clone();
            let name = name.clone();
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:before"));
                let result = call.call(args).await;
                log.lock().unwrap().push(format!("{name}:after"));
                result
            }
        })
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}
