//! Coordinator routing tests
//!
//! These tests exercise registration, routing, failure isolation and the
//! shared context through the public API only.

use chronos::integration::{handler_fn, Coordinator, Dispatch, EchoHandler, Handler};
use chronos::messages::Message;
use chronos::telemetry::LogBuffer;
use chronos::ChronosError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

/// Coordinator with the `echo` and `boom` handlers used across scenarios
fn scenario_coordinator() -> Coordinator {
    let coordinator = Coordinator::new();
    coordinator.register("echo", EchoHandler::default());
    coordinator.register(
        "boom",
        handler_fn(|_, _| Err(ChronosError::InferenceError("boom".into()))),
    );
    coordinator
}

#[tokio::test]
async fn test_echo_scenario() {
    let coordinator = scenario_coordinator();
    let out = coordinator.route(&Message::new("echo", "hi")).await;
    assert_eq!(out, Some(json!("echo:hi")));
}

#[tokio::test]
async fn test_missing_target_returns_none() {
    let coordinator = scenario_coordinator();
    assert_eq!(coordinator.route(&Message::new("missing", "hi")).await, None);
}

#[tokio::test]
async fn test_missing_target_logs_warning() {
    let logs = LogBuffer::new(100);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));

    let coordinator = scenario_coordinator();
    coordinator.route(&Message::new("missing", "hi")).await;

    let warnings = logs.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("missing"));
    assert!(logs.at_level(Level::ERROR).is_empty());
}

#[tokio::test]
async fn test_failing_handler_logs_exactly_one_error() {
    let logs = LogBuffer::new(100);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));

    let coordinator = scenario_coordinator();
    let out = coordinator.route(&Message::new("boom", "anything")).await;
    assert_eq!(out, None);

    let errors = logs.at_level(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("boom"));
    assert_eq!(errors[0].fields["handler"], json!("boom"));
}

#[tokio::test]
async fn test_panicking_handler_logs_exactly_one_error() {
    let logs = LogBuffer::new(100);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));

    let coordinator = Coordinator::new();
    coordinator.register("explode", handler_fn(|_, _| panic!("wires crossed")));

    let outcome = coordinator.dispatch(&Message::new("explode", "x")).await;
    assert_eq!(outcome, Dispatch::Failed("wires crossed".to_string()));

    let errors = logs.at_level(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("explode"));
}

#[tokio::test]
async fn test_dispatch_distinguishes_miss_from_failure() {
    let coordinator = scenario_coordinator();

    assert_eq!(
        coordinator.dispatch(&Message::new("missing", "x")).await,
        Dispatch::NotFound
    );
    assert!(matches!(
        coordinator.dispatch(&Message::new("boom", "x")).await,
        Dispatch::Failed(_)
    ));
    assert_eq!(
        coordinator.dispatch(&Message::new("echo", "x")).await,
        Dispatch::Handled(json!("echo:x"))
    );
}

#[test]
fn test_reregistration_keeps_only_latest_binding() {
    let coordinator = Coordinator::new();
    let first: Arc<dyn Handler> = Arc::new(EchoHandler::new("first:"));
    let second: Arc<dyn Handler> = Arc::new(EchoHandler::new("second:"));

    coordinator.register_arc("echo", first.clone());
    assert!(Arc::ptr_eq(&coordinator.handler("echo").unwrap(), &first));

    coordinator.register_arc("echo", second.clone());
    let bound = coordinator.handler("echo").unwrap();
    assert!(Arc::ptr_eq(&bound, &second));
    assert!(!Arc::ptr_eq(&bound, &first));
    assert_eq!(coordinator.handler_names(), vec!["echo"]);
}

#[tokio::test]
async fn test_reregistered_handler_receives_messages() {
    let coordinator = Coordinator::new();
    coordinator.register("echo", EchoHandler::new("first:"));
    coordinator.register("echo", EchoHandler::new("second:"));

    let out = coordinator.route(&Message::new("echo", "x")).await;
    assert_eq!(out, Some(json!("second:x")));
}

#[tokio::test]
async fn test_returned_value_is_passed_through_unchanged() {
    let payload = json!({ "answer": 42, "items": [1, 2, 3], "nested": { "ok": true } });
    let expected = payload.clone();

    let coordinator = Coordinator::new();
    coordinator.register("fixed", handler_fn(move |_, _| Ok(payload.clone())));

    assert_eq!(coordinator.route(&Message::new("fixed", "")).await, Some(expected));
}

#[tokio::test]
async fn test_routing_same_message_twice_is_idempotent() {
    let coordinator = scenario_coordinator();
    let message = Message::new("echo", "again");

    let first = coordinator.route(&message).await;
    let second = coordinator.route(&message).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_context_is_shared_with_handlers() {
    let coordinator = Coordinator::new();
    coordinator.set_context("greeting", "hello");
    coordinator.register(
        "greeter",
        handler_fn(|msg, ctx| {
            let greeting = ctx.get_str("greeting").unwrap_or_default();
            ctx.set("last_name", msg.content.clone());
            Ok(json!(format!("{} {}", greeting, msg.content_text())))
        }),
    );

    let out = coordinator.route(&Message::new("greeter", "Ada")).await;
    assert_eq!(out, Some(json!("hello Ada")));
    assert_eq!(coordinator.get_context("last_name", Value::Null), json!("Ada"));
    assert_eq!(coordinator.get_context("unset", json!(0)), json!(0));
}

#[tokio::test]
async fn test_message_fields_reach_the_handler() {
    let coordinator = Coordinator::new();
    coordinator.register(
        "fields",
        handler_fn(|msg, _| {
            Ok(json!({
                "kind": msg.kind,
                "user": msg.field_str("user_id"),
            }))
        }),
    );

    let message = Message::new("fields", "x")
        .with_kind("lookup")
        .with_field("user_id", "u-7");
    let out = coordinator.route(&message).await.unwrap();
    assert_eq!(out, json!({ "kind": "lookup", "user": "u-7" }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_routing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let coordinator = Arc::new(Coordinator::new());
    {
        let calls = Arc::clone(&calls);
        coordinator.register(
            "count",
            handler_fn(move |msg, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(msg.content.clone())
            }),
        );
    }

    let mut tasks = Vec::new();
    for i in 0..64 {
        let coordinator = Arc::clone(&coordinator);
        tasks.push(tokio::spawn(async move {
            coordinator.route(&Message::new("count", i)).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(json!(i)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 64);
    assert_eq!(coordinator.metrics().handled, 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registration_during_routing() {
    let coordinator = Arc::new(Coordinator::new());
    coordinator.register("echo", EchoHandler::default());

    let router = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            for _ in 0..200 {
                assert!(coordinator.route(&Message::new("echo", "x")).await.is_some());
            }
        })
    };

    for i in 0..200 {
        coordinator.register(format!("extra-{}", i), EchoHandler::default());
    }

    router.await.unwrap();
    assert_eq!(coordinator.handler_names().len(), 201);
}
