use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{CollectionPath, DocumentCreated, DocumentPath, DocumentSnapshot, Message};

/// Stream of creation events produced by a [`ChangeFeed`].
pub type CreatedStream = Pin<Box<dyn Stream<Item = Result<DocumentCreated>> + Send>>;

/// Write side of the document store.
///
/// Documents are append-only: nothing in this trait updates or deletes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a message in `collection`; the store assigns the document id.
    async fn add_message(&self, collection: &CollectionPath, message: Message) -> Result<DocumentPath>;

    /// Create a document from raw fields, as a client SDK would.
    async fn insert_raw(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<DocumentPath>;

    /// All documents currently in `collection`.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<DocumentSnapshot>>;
}

/// Source of document-creation notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Start listening. Only documents created after this call are reported,
    /// each exactly once per subscription.
    async fn subscribe(&self) -> Result<CreatedStream>;
}
