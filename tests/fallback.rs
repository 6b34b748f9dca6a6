//! Fallback resolution through a built client.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use resilient_exchange::contract::ServiceImpl;
use resilient_exchange::decorators::{ErrorSelector, FallbackCandidate, FallbackProducer};
use resilient_exchange::{BuildError, CallError, Decorators, ErrorKind, RemoteError, ResilientClient};

mod common;

use common::{
    greeting, greeting_contract, greeting_fallback, greeting_with_name, new_log, CountingWrapper, ScriptedRemote,
};

#[derive(Debug, thiserror::Error)]
#[error("quota exhausted")]
struct QuotaExhausted;

fn failing_fallback() -> ServiceImpl {
    ServiceImpl::builder("FailingFallback")
        .handle(greeting(), |_args| async {
            Err(CallError::from(RemoteError::with_status(502, "fallback down")))
        })
        .handle(greeting_with_name(), |_args| async { Ok(json!("unused")) })
        .build()
}

fn constant_fallback(type_name: &str, reply: &'static str) -> ServiceImpl {
    ServiceImpl::builder(type_name)
        .handle(greeting(), move |_args| async move { Ok(json!(reply)) })
        .handle(greeting_with_name(), move |_args| async move { Ok(json!(reply)) })
        .build()
}

#[tokio::test]
async fn test_fallback_receives_original_arguments() {
    let client = ResilientClient::builder(Decorators::builder().with_fallback(greeting_fallback()).build())
        .remote(ScriptedRemote::failing())
        .build(greeting_contract())
        .unwrap();

    let value = client.call("greeting_with_name", vec![json!("Ada")]).await.unwrap();
    assert_eq!(value, json!("Hello, Ada, from fallback"));

    let value = client.call("greeting", Vec::new()).await.unwrap();
    assert_eq!(value, json!("Hello from fallback"));
}

#[tokio::test]
async fn test_first_matching_candidate_wins() {
    let decorators = Decorators::builder()
        .with_fallback_for_kind(constant_fallback("ServerFallback", "server"), ErrorKind::RemoteServer)
        .with_fallback(constant_fallback("AnyFallback", "any"))
        .build();
    assert_eq!(decorators.stages().len(), 1);

    let server = ResilientClient::builder(decorators.clone())
        .remote(ScriptedRemote::failing())
        .build(greeting_contract())
        .unwrap();
    assert_eq!(server.call("greeting", Vec::new()).await.unwrap(), json!("server"));

    let client = ResilientClient::builder(decorators)
        .remote(ScriptedRemote::failing().with_failure(RemoteError::with_status(404, "not found")))
        .build(greeting_contract())
        .unwrap();
    assert_eq!(client.call("greeting", Vec::new()).await.unwrap(), json!("any"));
}

#[tokio::test]
async fn test_unmatched_error_is_returned_unchanged() {
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback_for_kind(greeting_fallback(), ErrorKind::Rejected)
            .build(),
    )
    .remote(ScriptedRemote::failing().with_failure(RemoteError::with_status(500, "boom")))
    .build(greeting_contract())
    .unwrap();

    let err = client.call("greeting", Vec::new()).await.unwrap_err();
    match err {
        CallError::Remote(remote) => {
            assert_eq!(remote.status(), Some(500));
            assert_eq!(remote.message(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_factory_receives_the_exact_error() {
    let original = Arc::new(QuotaExhausted);
    let seen: Arc<Mutex<Option<CallError>>> = Arc::new(Mutex::new(None));

    let raised = original.clone();
    let contract = resilient_exchange::CallContract::builder("GreetingService")
        .remote(greeting())
        .build()
        .unwrap();
    let recorder = seen.clone();
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback_factory(move |error: &CallError| {
                *recorder.lock().unwrap() = Some(error.clone());
                let message = error.to_string();
                ServiceImpl::builder("EchoErrorFallback")
                    .handle(greeting(), move |_args| {
                        let message = message.clone();
                        async move { Ok(Value::String(message)) }
                    })
                    .build()
            })
            .build(),
    )
    .remote(resilient_exchange::remote_fn(move |_op, _args| {
        let raised = raised.clone();
        async move { Err(CallError::Application(raised)) }
    }))
    .build(contract)
    .unwrap();

    let value = client.call("greeting", Vec::new()).await.unwrap();
    assert_eq!(value, json!("quota exhausted"));

    let seen = seen.lock().unwrap().take().unwrap();
    match seen {
        CallError::Application(error) => {
            let expected: Arc<dyn std::error::Error + Send + Sync> = original;
            assert!(Arc::ptr_eq(&error, &expected));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unmatched_application_error_keeps_identity() {
    let original: Arc<dyn std::error::Error + Send + Sync> = Arc::new(QuotaExhausted);
    let raised = original.clone();
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback_for_kind(greeting_fallback(), ErrorKind::Remote)
            .build(),
    )
    .remote(resilient_exchange::remote_fn(move |_op, _args| {
        let raised = raised.clone();
        async move { Err(CallError::Application(raised)) }
    }))
    .build(greeting_contract())
    .unwrap();

    match client.call("greeting", Vec::new()).await.unwrap_err() {
        CallError::Application(error) => assert!(Arc::ptr_eq(&error, &original)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_typed_selector_matches_application_error() {
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback_candidate(FallbackCandidate::new(
                ErrorSelector::of_type::<QuotaExhausted>(),
                FallbackProducer::instance(greeting_fallback()),
            ))
            .build(),
    )
    .remote(resilient_exchange::remote_fn(|_op, _args| async {
        Err(CallError::application(QuotaExhausted))
    }))
    .build(greeting_contract())
    .unwrap();

    assert_eq!(client.call("greeting", Vec::new()).await.unwrap(), json!("Hello from fallback"));
}

#[tokio::test]
async fn test_failing_fallback_propagates_its_own_error() {
    let failing = ServiceImpl::builder("FailingFallback")
        .handle(greeting(), |_args| async {
            Err(CallError::from(RemoteError::with_status(502, "fallback down")))
        })
        .handle(greeting_with_name(), |_args| async { Ok(json!("unused")) })
        .build();
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback(failing)
            .with_fallback(greeting_fallback())
            .build(),
    )
    .remote(ScriptedRemote::failing())
    .build(greeting_contract())
    .unwrap();

    let err = client.call("greeting", Vec::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "remote call failed: fallback down");
}

#[tokio::test]
async fn test_failing_fallback_is_not_resolved_by_outer_fallback() {
    let log = new_log();
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback(greeting_fallback())
            .with_wrapper(CountingWrapper::new("between", log.clone()))
            .with_fallback(failing_fallback())
            .build(),
    )
    .remote(ScriptedRemote::failing())
    .build(greeting_contract())
    .unwrap();

    let err = client.call("greeting", Vec::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "remote call failed: fallback down");
    assert_eq!(*log.lock().unwrap(), vec!["between:before", "between:after"]);

    let value = client.call("greeting_with_name", vec![json!("Ada")]).await.unwrap();
    assert_eq!(value, json!("unused"));
}

#[tokio::test]
async fn test_unmatched_inner_error_still_reaches_outer_fallback() {
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback(greeting_fallback())
            .with_wrapper(CountingWrapper::new("between", new_log()))
            .with_fallback_for_kind(failing_fallback(), ErrorKind::Rejected)
            .build(),
    )
    .remote(ScriptedRemote::failing())
    .build(greeting_contract())
    .unwrap();

    let value = client.call("greeting", Vec::new()).await.unwrap();
    assert_eq!(value, json!("Hello from fallback"));
}

#[test]
fn test_static_fallback_missing_operation_fails_build() {
    let partial = ServiceImpl::builder("PartialFallback")
        .handle(greeting(), |_args| async { Ok(json!("partial")) })
        .build();

    let err = ResilientClient::builder(Decorators::builder().with_fallback(partial).build())
        .remote(ScriptedRemote::failing())
        .build(greeting_contract())
        .unwrap_err();

    match err {
        BuildError::InvalidFallback(CallError::FallbackConfig {
            fallback,
            contract,
            missing,
        }) => {
            assert_eq!(fallback, "PartialFallback");
            assert_eq!(contract, "GreetingService");
            assert_eq!(missing, vec!["greeting_with_name(String) -> String".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_factory_product_is_checked_on_first_use() {
    let remote = Arc::new(ScriptedRemote::failing());
    let client = ResilientClient::builder(
        Decorators::builder()
            .with_fallback_factory(|_error: &CallError| {
                ServiceImpl::builder("LazyFallback")
                    .handle(greeting(), |_args| async { Ok(json!("lazy")) })
                    .build()
            })
            .build(),
    )
    .shared_remote(remote.clone())
    .build(greeting_contract())
    .unwrap();

    let err = client.call("greeting", Vec::new()).await.unwrap_err();
    assert!(err.is(ErrorKind::FallbackConfig));
    assert_eq!(
        err.to_string(),
        "Cannot use the fallback [LazyFallback] for [GreetingService]: missing greeting_with_name(String) -> String"
    );
    assert_eq!(remote.calls(), 1);
}
