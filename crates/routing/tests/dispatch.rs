#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end dispatch behaviour driven through a deterministic spawner.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    parley_common::Message,
    parley_context::{ContextEntry, ContextStore, InMemoryContextStore},
    parley_routing::{
        Delivery, Dispatch, Error, Handler, ManualSpawner, Router, TokioSpawner, handler_fn,
    },
    serde_json::{Value, json},
};

const BASIC: &str = "https://didcomm.org/basicmessage/2.0/message";
const PING: &str = "https://didcomm.org/trust-ping/2.0/ping";

type Log = Arc<Mutex<Vec<String>>>;

fn setup() -> (Router, Arc<ManualSpawner>, Arc<dyn ContextStore>) {
    let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
    let spawner = Arc::new(ManualSpawner::new());
    let router = Router::new(Arc::clone(&store), spawner.clone());
    (router, spawner, store)
}

/// Handler that appends `name` to `log` when it runs.
fn recording(name: &'static str, log: &Log) -> Arc<dyn Handler> {
    let log = Arc::clone(log);
    handler_fn(name, move |_router, _delivery| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name.to_string());
            Ok(())
        }
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn routes_fan_out_in_registration_order() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("first", &log)).unwrap();
    router.add_route(BASIC, recording("second", &log)).unwrap();
    router.add_route(BASIC, recording("third", &log)).unwrap();

    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Routed {
        handlers: vec!["first".into(), "second".into(), "third".into()],
    });
    assert_eq!(spawner.pending_labels(), ["first", "second", "third"]);

    spawner.run_pending().await;
    assert_eq!(entries(&log), ["first", "second", "third"]);
}

#[tokio::test]
async fn adding_the_same_route_twice_is_idempotent() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    let handler = recording("only", &log);
    router.add_route(BASIC, Arc::clone(&handler)).unwrap();
    router.add_route(BASIC, handler).unwrap();

    assert_eq!(router.routes(), vec![(BASIC.to_string(), vec!["only".to_string()])]);
    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(spawner.run_pending().await, 1);
}

#[tokio::test]
async fn a_taken_name_cannot_be_rebound_by_another_type() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("shared", &log)).unwrap();

    let impostor = handler_fn("shared", |_router, _delivery| async {
        anyhow::bail!("must never run")
    });
    let err = router.add_route(PING, impostor).unwrap_err();
    assert!(matches!(err, Error::HandlerNameTaken { ref name } if name == "shared"));
    assert_eq!(router.routes(), vec![(BASIC.to_string(), vec!["shared".to_string()])]);

    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    spawner.run_pending().await;
    assert_eq!(entries(&log), ["shared"]);
}

#[tokio::test]
async fn a_taken_name_cannot_be_rebound_for_the_same_type_or_continuations() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("step", &log)).unwrap();

    let other = Log::default();
    assert!(matches!(
        router.add_route(BASIC, recording("step", &other)),
        Err(Error::HandlerNameTaken { .. })
    ));
    assert!(matches!(
        router.add_named_handler(recording("step", &other)),
        Err(Error::HandlerNameTaken { .. })
    ));
    assert!(matches!(
        router.engage("did:alice", BASIC, recording("step", &other)),
        Err(Error::HandlerNameTaken { .. })
    ));
    assert!(router.continuation_for("did:alice", BASIC).is_none());

    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(spawner.run_pending().await, 1);
    assert_eq!(entries(&log), ["step"]);
    assert!(entries(&other).is_empty());
}

#[tokio::test]
async fn await_takes_precedence_over_routes() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("route", &log)).unwrap();

    let pending = router.wait_for_message("did:alice", BASIC).unwrap();
    let dispatch = router
        .route_message(Message::new(BASIC, "did:alice").with_body(json!({"content": "blue"})))
        .unwrap();
    assert_eq!(dispatch, Dispatch::Awaited);
    assert_eq!(spawner.pending(), 0);

    let delivery = pending.await.unwrap();
    assert_eq!(delivery.message.content(), Some("blue"));
    assert_eq!(delivery.contact.namespace(), "contact:did:alice");

    // The wait was one-shot; the next message goes to the route.
    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert!(matches!(dispatch, Dispatch::Routed { .. }));
    spawner.run_pending().await;
    assert_eq!(entries(&log), ["route"]);
}

#[tokio::test]
async fn await_only_matches_its_peer() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("route", &log)).unwrap();

    let _pending = router.wait_for_message("did:alice", BASIC).unwrap();
    let dispatch = router.route_message(Message::new(BASIC, "did:bob")).unwrap();
    assert!(matches!(dispatch, Dispatch::Routed { .. }));
    assert!(router.is_waiting("did:alice", BASIC));
    spawner.run_pending().await;
}

#[tokio::test]
async fn continuation_takes_precedence_over_await() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_named_handler(recording("continuation", &log)).unwrap();
    router.engage_named_handler("did:alice", BASIC, "continuation").unwrap();
    let _pending = router.wait_for_message("did:alice", BASIC).unwrap();

    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Continuation {
        handler: "continuation".into(),
    });
    // The wait is still pending for the next message.
    assert!(router.is_waiting("did:alice", BASIC));

    spawner.run_pending().await;
    assert_eq!(entries(&log), ["continuation"]);

    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Awaited);
}

#[tokio::test]
async fn continuation_is_single_use() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("route", &log)).unwrap();
    router.engage("did:alice", BASIC, recording("step", &log)).unwrap();
    assert_eq!(router.continuation_for("did:alice", BASIC).as_deref(), Some("step"));

    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert!(router.continuation_for("did:alice", BASIC).is_none());
    router.route_message(Message::new(BASIC, "did:alice")).unwrap();

    spawner.run_pending().await;
    assert_eq!(entries(&log), ["step", "route"]);
}

#[tokio::test]
async fn engaging_an_unregistered_name_fails() {
    let (router, _, _) = setup();
    let err = router
        .engage_named_handler("did:alice", BASIC, "missing")
        .unwrap_err();
    assert!(matches!(err, Error::UnknownHandler { ref name } if name == "missing"));
    assert!(router.continuation_for("did:alice", BASIC).is_none());
}

#[tokio::test]
async fn unknown_messages_fall_back() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("route", &log)).unwrap();
    router.set_unknown_handler(recording("fallback", &log));

    let dispatch = router.route_message(Message::new(PING, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Unknown);
    spawner.run_pending().await;
    assert_eq!(entries(&log), ["fallback"]);
}

#[tokio::test]
async fn default_unknown_handler_runs_cleanly() {
    let (router, spawner, _) = setup();
    let dispatch = router.route_message(Message::new(PING, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Unknown);
    assert_eq!(spawner.pending_labels(), ["unknown_message"]);
    assert_eq!(spawner.run_pending().await, 1);
}

#[tokio::test]
async fn invalid_messages_are_rejected_before_dispatch() {
    let (router, spawner, store) = setup();
    let log = Log::default();
    router.add_route(BASIC, recording("route", &log)).unwrap();

    let err = router
        .route_value(json!({"type": BASIC, "body": {}}))
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "from" }));

    let err = router
        .route_message(Message::new("", "did:alice"))
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "type" }));

    assert!(matches!(
        router.route_value(json!({"type": 7, "from": "did:alice"})),
        Err(Error::InvalidMessage(_))
    ));

    assert_eq!(spawner.pending(), 0);
    assert!(store.namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn contexts_alias_by_peer_and_isolate_threads() {
    let (router, spawner, _) = setup();
    let seen: Arc<Mutex<Vec<Delivery>>> = Arc::default();
    let sink = Arc::clone(&seen);
    router.add_route(
        BASIC,
        handler_fn("capture", move |_router, delivery| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(delivery);
                Ok(())
            }
        }),
    )
    .unwrap();

    router
        .route_message(Message::new(BASIC, "did:alice").with_thid("t1"))
        .unwrap();
    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    spawner.run_pending().await;

    let deliveries = seen.lock().unwrap().clone();
    let (threaded, plain) = (&deliveries[0], &deliveries[1]);
    assert!(plain.thread.is_none());
    let thread = threaded.thread.as_ref().unwrap();
    assert_eq!(thread.namespace(), "thread:did:alice:t1");

    threaded.contact.set("name", "alice").await.unwrap();
    assert_eq!(plain.contact.get("name").await.unwrap(), Some(json!("alice")));

    thread.set("name", "thread-local").await.unwrap();
    assert_eq!(plain.contact.get("name").await.unwrap(), Some(json!("alice")));
    assert_eq!(
        router.contact_context("did:bob").get("name").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn failing_handler_does_not_affect_siblings() {
    let (router, spawner, _) = setup();
    let log = Log::default();
    router.add_route(
        BASIC,
        handler_fn("broken", |_router, _delivery| async {
            anyhow::bail!("storage exploded")
        }),
    )
    .unwrap();
    router.add_route(BASIC, recording("healthy", &log)).unwrap();

    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(spawner.run_pending().await, 2);
    assert_eq!(entries(&log), ["healthy"]);
}

/// Store whose writes always fail; reads see an empty store.
struct FailingStore;

#[async_trait]
impl ContextStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _namespace: &str, _key: &str) -> parley_context::Result<Option<ContextEntry>> {
        Ok(None)
    }

    async fn set(&self, _namespace: &str, _key: &str, _value: Value) -> parley_context::Result<()> {
        Err(parley_context::Error::message("disk full"))
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> parley_context::Result<bool> {
        Ok(false)
    }

    async fn list(&self, _namespace: &str) -> parley_context::Result<Vec<ContextEntry>> {
        Ok(Vec::new())
    }

    async fn namespaces(&self) -> parley_context::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn clear(&self, _namespace: &str) -> parley_context::Result<u64> {
        Ok(0)
    }
}

#[tokio::test]
async fn storage_failures_reach_the_handler_and_spare_siblings() {
    let store: Arc<dyn ContextStore> = Arc::new(FailingStore);
    let spawner = Arc::new(ManualSpawner::new());
    let router = Router::new(store, spawner.clone());
    let log = Log::default();
    let failures: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&failures);

    router
        .add_route(
            BASIC,
            handler_fn("remember", move |_router, delivery| {
                let sink = Arc::clone(&sink);
                async move {
                    let result = delivery.contact.set("seen", true).await;
                    if let Err(err) = &result {
                        sink.lock().unwrap().push(err.to_string());
                    }
                    result?;
                    Ok(())
                }
            }),
        )
        .unwrap();
    router.add_route(BASIC, recording("healthy", &log)).unwrap();

    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Routed {
        handlers: vec!["remember".into(), "healthy".into()],
    });
    assert_eq!(spawner.run_pending().await, 2);

    assert_eq!(*failures.lock().unwrap(), ["disk full"]);
    assert_eq!(entries(&log), ["healthy"]);

    // The router keeps dispatching after a handler's write failed.
    assert!(router.route_message(Message::new(BASIC, "did:alice")).is_ok());
    assert_eq!(spawner.run_pending().await, 2);
}

#[tokio::test]
async fn thread_contexts_keep_colon_bearing_peers_apart() {
    let (router, _, store) = setup();
    let first = router.thread_context("did:example:alice", "t1");
    let second = router.thread_context("did:example", "alice:t1");
    assert_ne!(first.namespace(), second.namespace());

    first.set("step", "first").await.unwrap();
    assert_eq!(second.get("step").await.unwrap(), None);
    assert_eq!(store.namespaces().await.unwrap(), [first.namespace()]);
}

#[tokio::test]
async fn second_wait_for_same_key_is_rejected() {
    let (router, _, _) = setup();
    let _first = router.wait_for_message("did:alice", BASIC).unwrap();
    assert!(matches!(
        router.wait_for_message("did:alice", BASIC),
        Err(Error::AwaitAlreadyRegistered { .. })
    ));
    assert!(router.cancel_wait("did:alice", BASIC));
    assert!(router.wait_for_message("did:alice", BASIC).is_ok());
}

#[tokio::test(start_paused = true)]
async fn router_default_wait_timeout_applies() {
    let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
    let router = Router::builder(store, Arc::new(ManualSpawner::new()))
        .wait_timeout(Some(Duration::from_secs(30)))
        .build();

    let pending = router.wait_for_message("did:alice", BASIC).unwrap();
    assert_eq!(pending.deadline(), Some(Duration::from_secs(30)));
    assert!(matches!(
        pending.await,
        Err(Error::WaitTimedOut { .. })
    ));

    // A timed-out wait leaves nothing behind that could swallow a message.
    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Unknown);
}

/// The basicmessage walk-through: a route writes `step=start`, a later
/// continuation reads it back from the same contact context.
#[tokio::test]
async fn basicmessage_step_scenario() {
    let (router, spawner, store) = setup();
    let observed: Arc<Mutex<Option<String>>> = Arc::default();
    let out = Arc::clone(&observed);

    router.add_named_handler(handler_fn("step_two", move |_router, delivery| {
        let out = Arc::clone(&out);
        async move {
            let step: Option<String> = delivery.contact.get_as("step").await?;
            *out.lock().unwrap() = step;
            Ok(())
        }
    }))
    .unwrap();
    router.add_route(
        BASIC,
        handler_fn("start", |router, delivery| async move {
            delivery.contact.set("step", "start").await?;
            router.engage_named_handler(delivery.peer(), delivery.msg_type(), "step_two")?;
            Ok(())
        }),
    )
    .unwrap();

    router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    spawner.run_pending().await;
    assert_eq!(
        router.continuation_for("did:alice", BASIC).as_deref(),
        Some("step_two")
    );

    let dispatch = router.route_message(Message::new(BASIC, "did:alice")).unwrap();
    assert_eq!(dispatch, Dispatch::Continuation {
        handler: "step_two".into(),
    });
    spawner.run_pending().await;

    assert_eq!(observed.lock().unwrap().as_deref(), Some("start"));
    assert_eq!(
        store.get("contact:did:alice", "step").await.unwrap().map(|e| e.value),
        Some(json!("start"))
    );
}

#[tokio::test]
async fn handler_can_wait_inline_with_tokio_spawner() {
    let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
    let router = Router::new(store, Arc::new(TokioSpawner::new()));
    let (tx, rx) = tokio::sync::oneshot::channel::<String>();
    let tx = Arc::new(Mutex::new(Some(tx)));

    router.add_route(
        PING,
        handler_fn("ask", move |router, delivery| {
            let tx = Arc::clone(&tx);
            async move {
                let reply = router.wait_for_message(delivery.peer(), BASIC)?.await?;
                let answer = reply.message.content().unwrap_or_default().to_string();
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(answer);
                }
                Ok(())
            }
        }),
    )
    .unwrap();

    router.route_message(Message::new(PING, "did:alice")).unwrap();
    while !router.is_waiting("did:alice", BASIC) {
        tokio::task::yield_now().await;
    }
    let dispatch = router
        .route_message(Message::new(BASIC, "did:alice").with_body(json!({"content": "green"})))
        .unwrap();
    assert_eq!(dispatch, Dispatch::Awaited);
    assert_eq!(rx.await.unwrap(), "green");
}
