use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatecho_persist::{
    chat_messages, ChangeFeed, DocumentCreated, DocumentPath, DocumentSnapshot, DocumentStore,
    InMemoryStore, Message, Origin, PersistError,
};
use chatecho_trigger::{
    EchoHandler, PathParams, PathPattern, RunStats, TriggerError, TriggerHandler, TriggerRuntime,
};
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn created(path: &str, data: Value) -> DocumentCreated {
    DocumentCreated::new(DocumentSnapshot::new(DocumentPath::parse(path).unwrap(), fields(data)))
}

fn echo_runtime(store: Arc<InMemoryStore>) -> TriggerRuntime {
    TriggerRuntime::builder()
        .on_create(EchoHandler::pattern().unwrap(), Arc::new(EchoHandler::new(store)))
        .build()
        .unwrap()
}

async fn run_events(runtime: &TriggerRuntime, events: Vec<DocumentCreated>) -> RunStats {
    let events = stream::iter(events.into_iter().map(Ok::<_, PersistError>));
    runtime
        .run_stream(events, std::future::pending())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_user_message_produces_one_echo() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());

    let stats = run_events(
        &runtime,
        vec![created("chats/u1/messages/m1", json!({ "text": "hello", "isUserMessage": true }))],
    )
    .await;

    assert_eq!(stats, RunStats { dispatched: 1, succeeded: 1, failed: 0, skipped: 0 });

    let docs = store.list(&chat_messages("u1").unwrap()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].message().text(), "You said: hello");
    assert_eq!(docs[0].message().origin(), Origin::System);
    assert!(docs[0].data.contains_key("createdAt"));
}

#[tokio::test]
async fn test_non_user_message_is_noop() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());

    let stats = run_events(
        &runtime,
        vec![created("chats/u1/messages/m2", json!({ "text": "hi", "isUserMessage": false }))],
    )
    .await;

    assert_eq!(stats.succeeded, 1);
    assert!(store.list(&chat_messages("u1").unwrap()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unmatched_paths_are_skipped() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());

    let stats = run_events(
        &runtime,
        vec![
            created("rooms/r1/messages/m1", json!({ "text": "x", "isUserMessage": true })),
            created("chats/u1", json!({ "title": "x" })),
        ],
    )
    .await;

    assert_eq!(stats, RunStats { dispatched: 0, succeeded: 0, failed: 0, skipped: 2 });
}

#[tokio::test]
async fn test_echoes_stay_under_their_user() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());

    run_events(
        &runtime,
        vec![
            created("chats/alice/messages/a", json!({ "text": "one", "isUserMessage": true })),
            created("chats/bob/messages/b", json!({ "text": "two", "isUserMessage": true })),
        ],
    )
    .await;

    let alice = store.list(&chat_messages("alice").unwrap()).await.unwrap();
    let bob = store.list(&chat_messages("bob").unwrap()).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(bob.len(), 1);
    assert_eq!(alice[0].message().text(), "You said: one");
    assert_eq!(bob[0].message().text(), "You said: two");
}

#[tokio::test]
async fn test_write_failure_is_reported_not_retried() {
    let store = Arc::new(InMemoryStore::new());
    store.fail_writes(true);
    let runtime = echo_runtime(store.clone());

    let stats = run_events(
        &runtime,
        vec![created("chats/u1/messages/m1", json!({ "text": "hello", "isUserMessage": true }))],
    )
    .await;

    assert_eq!(stats, RunStats { dispatched: 1, succeeded: 0, failed: 1, skipped: 0 });
    assert!(store.list(&chat_messages("u1").unwrap()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_echo_does_not_recurse() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());
    let collection = chat_messages("u1").unwrap();

    let mut feed = store.subscribe().await.unwrap();
    store.add_message(&collection, Message::user("ping")).await.unwrap();

    // The user message
    let first = runtime
        .run_stream((&mut feed).take(1), std::future::pending())
        .await
        .unwrap();
    assert_eq!(first.succeeded, 1);
    assert_eq!(store.list(&collection).await.unwrap().len(), 2);

    // The echo it caused
    let second = runtime
        .run_stream((&mut feed).take(1), std::future::pending())
        .await
        .unwrap();
    assert_eq!(second.succeeded, 1);
    assert_eq!(store.list(&collection).await.unwrap().len(), 2);

    let pending = tokio::time::timeout(Duration::from_millis(50), feed.next()).await;
    assert!(pending.is_err(), "echo must not create further documents");
}

#[tokio::test]
async fn test_run_against_live_feed_until_shutdown() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());
    let collection = chat_messages("u1").unwrap();

    let feed = store.subscribe().await.unwrap();
    store
        .insert_raw(&collection, fields(json!({ "text": "live", "isUserMessage": true })))
        .await
        .unwrap();

    let watched = store.clone();
    let shutdown = async move {
        loop {
            if watched.list(&chat_messages("u1").unwrap()).await.unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };

    let stats = tokio::time::timeout(Duration::from_secs(5), runtime.run_stream(feed, shutdown))
        .await
        .expect("runtime should stop on shutdown")
        .unwrap();

    assert!(stats.dispatched >= 1);
    assert_eq!(stats.failed, 0);
    let texts: Vec<String> = store
        .list(&collection)
        .await
        .unwrap()
        .iter()
        .map(|d| d.message().text().into_owned())
        .collect();
    assert_eq!(texts, vec!["live".to_string(), "You said: live".to_string()]);
}

#[tokio::test]
async fn test_run_subscribes_to_store_feed() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store.clone());
    let collection = chat_messages("u1").unwrap();

    let writer = {
        let store = store.clone();
        let collection = collection.clone();
        async move {
            while store.subscriber_count() == 0 {
                tokio::task::yield_now().await;
            }
            store.add_message(&collection, Message::user("hello")).await.unwrap();
        }
    };

    let watched = store.clone();
    let shutdown = async move {
        while watched.list(&chat_messages("u1").unwrap()).await.unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };

    let (stats, ()) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(runtime.run(&*store, shutdown), writer) },
    )
    .await
    .expect("runtime should stop once the echo exists");

    let stats = stats.unwrap();
    assert_eq!(stats.failed, 0);
    assert!(stats.succeeded >= 1);

    let docs = store.list(&collection).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1].message().text(), "You said: hello");
    assert_eq!(docs[1].message().origin(), Origin::System);
}

struct NappingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl TriggerHandler for NappingHandler {
    async fn on_create(&self, _event: &DocumentCreated, _params: &PathParams) -> chatecho_trigger::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "napping"
    }
}

#[tokio::test]
async fn test_shutdown_while_every_slot_is_busy() {
    let napper = Arc::new(NappingHandler { calls: AtomicUsize::new(0) });
    let runtime = TriggerRuntime::builder()
        .on_create(PathPattern::parse("items/{id}").unwrap(), napper.clone())
        .max_concurrent_invocations(1)
        .build()
        .unwrap();

    let events = stream::iter(
        vec![
            created("items/1", json!({})),
            created("items/2", json!({})),
            created("items/3", json!({})),
        ]
        .into_iter()
        .map(Ok::<_, PersistError>),
    )
    .chain(stream::pending());
    let shutdown = tokio::time::sleep(Duration::from_millis(20));

    let stats = tokio::time::timeout(Duration::from_secs(2), runtime.run_stream(events, shutdown))
        .await
        .expect("shutdown must not wait behind a busy slot")
        .unwrap();

    assert_eq!(stats, RunStats { dispatched: 1, succeeded: 1, failed: 0, skipped: 0 });
    assert_eq!(napper.calls.load(Ordering::SeqCst), 1);
}

struct SlowHandler;

#[async_trait]
impl TriggerHandler for SlowHandler {
    async fn on_create(&self, _event: &DocumentCreated, _params: &PathParams) -> chatecho_trigger::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_invocation_timeout_counts_as_failure() {
    let runtime = TriggerRuntime::builder()
        .on_create(PathPattern::parse("items/{id}").unwrap(), Arc::new(SlowHandler))
        .invocation_timeout(Duration::from_millis(10))
        .build()
        .unwrap();

    let stats = run_events(&runtime, vec![created("items/1", json!({}))]).await;
    assert_eq!(stats, RunStats { dispatched: 1, succeeded: 0, failed: 1, skipped: 0 });
}

struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl TriggerHandler for CountingHandler {
    async fn on_create(&self, _event: &DocumentCreated, params: &PathParams) -> chatecho_trigger::Result<()> {
        params.require("id")?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[tokio::test]
async fn test_every_matching_registration_is_invoked() {
    let counter = Arc::new(CountingHandler { calls: AtomicUsize::new(0) });
    let runtime = TriggerRuntime::builder()
        .on_create(PathPattern::parse("items/{id}").unwrap(), counter.clone())
        .on_create(PathPattern::parse("items/{id}").unwrap(), counter.clone())
        .max_concurrent_invocations(1)
        .build()
        .unwrap();

    let stats = run_events(
        &runtime,
        vec![created("items/1", json!({})), created("items/2", json!({}))],
    )
    .await;

    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.succeeded, 4);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_feed_error_stops_run() {
    let store = Arc::new(InMemoryStore::new());
    let runtime = echo_runtime(store);

    let events = stream::iter(vec![Err(PersistError::FeedLagged(3))]);
    let result = runtime.run_stream(events, std::future::pending()).await;

    assert!(matches!(result, Err(TriggerError::Feed(PersistError::FeedLagged(3)))));
}

#[test]
fn test_builder_validation() {
    assert!(matches!(TriggerRuntime::builder().build(), Err(TriggerError::Config(_))));

    let store = Arc::new(InMemoryStore::new());
    let result = TriggerRuntime::builder()
        .on_create(EchoHandler::pattern().unwrap(), Arc::new(EchoHandler::new(store)))
        .max_concurrent_invocations(0)
        .build();
    assert!(matches!(result, Err(TriggerError::Config(_))));
}
