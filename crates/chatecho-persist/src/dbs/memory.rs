use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

use crate::error::{PersistError, Result};
use crate::models::{CollectionPath, DocumentCreated, DocumentPath, DocumentSnapshot, Message};
use crate::trait_client::{ChangeFeed, CreatedStream, DocumentStore};

const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Process-local document store with a built-in change feed.
///
/// Used for tests and local runs. Every successful insert is broadcast to all
/// current subscribers.
pub struct InMemoryStore {
    collections: RwLock<HashMap<CollectionPath, Vec<DocumentSnapshot>>>,
    events: broadcast::Sender<DocumentCreated>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            collections: RwLock::new(HashMap::new()),
            events,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with [`PersistError::WriteRejected`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of open change-feed subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    async fn insert(&self, collection: &CollectionPath, data: Map<String, Value>) -> Result<DocumentPath> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::WriteRejected(format!(
                "writes to {} are disabled",
                collection
            )));
        }

        let path = collection.doc(&uuid::Uuid::new_v4().simple().to_string())?;
        let snapshot = DocumentSnapshot::new(path.clone(), data);

        self.collections
            .write()
            .await
            .entry(collection.clone())
            .or_default()
            .push(snapshot.clone());

        // No subscribers is fine
        let _ = self.events.send(DocumentCreated::new(snapshot));

        tracing::debug!(path = %path, "Document created");
        Ok(path)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn add_message(&self, collection: &CollectionPath, message: Message) -> Result<DocumentPath> {
        let fields = message.to_fields()?;
        self.insert(collection, fields).await
    }

    async fn insert_raw(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<DocumentPath> {
        self.insert(collection, data).await
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<DocumentSnapshot>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryStore {
    async fn subscribe(&self) -> Result<CreatedStream> {
        let mut rx = self.events.subscribe();

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield Ok(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change feed subscriber lagged");
                        yield Err(PersistError::FeedLagged(skipped));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
