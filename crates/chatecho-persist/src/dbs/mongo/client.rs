use std::time::Duration;

use async_trait::async_trait;
use futures::{future, StreamExt, TryStreamExt};
use mongodb::bson::{self, doc, Document};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde_json::{Map, Value};

use crate::dbs::mongo::models::{id_to_segment, snapshot_from_bson, MongoMessage};
use crate::error::{PersistError, Result};
use crate::models::{CollectionPath, DocumentCreated, DocumentPath, DocumentSnapshot, Message};
use crate::trait_client::{ChangeFeed, CreatedStream, DocumentStore};

/// Connection settings for [`MongoStore`].
#[derive(Debug, Clone)]
pub struct MongoStoreOptions {
    pub database: String,
    /// Applied to both connect and server selection.
    pub timeout: Duration,
    /// Only report inserts into collections whose name matches this regex.
    pub collection_filter: Option<String>,
}

impl MongoStoreOptions {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            timeout: Duration::from_secs(5),
            collection_filter: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn collection_filter(mut self, regex: impl Into<String>) -> Self {
        self.collection_filter = Some(regex.into());
        self
    }
}

/// MongoDB-backed store.
///
/// A collection path maps verbatim onto a collection name, so
/// `chats/u1/messages` is the collection named `chats/u1/messages`. The change
/// feed is a database-level change stream, which needs a replica set.
pub struct MongoStore {
    database: Database,
    collection_filter: Option<String>,
}

impl MongoStore {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, options: MongoStoreOptions) -> Result<Self> {
        let mut client_options = ClientOptions::parse(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        client_options.connect_timeout = Some(options.timeout);
        client_options.server_selection_timeout = Some(options.timeout);
        client_options.app_name = Some("chatecho".to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            database: client.database(&options.database),
            collection_filter: options.collection_filter,
        })
    }

    /// Round-trip to the server; fails if it is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(())
    }

    fn pipeline(&self) -> Vec<Document> {
        let mut filter = doc! { "operationType": "insert" };
        if let Some(regex) = &self.collection_filter {
            filter.insert("ns.coll", doc! { "$regex": regex.as_str() });
        }
        vec![doc! { "$match": filter }]
    }
}

/// Map a change-stream namespace onto a collection path. Collections whose
/// names are not valid paths are outside the trigger namespace.
fn watched_collection(coll: &str) -> Option<CollectionPath> {
    match CollectionPath::parse(coll) {
        Ok(collection) => Some(collection),
        Err(e) => {
            tracing::warn!(collection = coll, error = %e, "Ignoring insert into non-path collection");
            None
        }
    }
}

fn created_from_event(event: ChangeStreamEvent<Document>) -> Result<Option<DocumentCreated>> {
    if event.operation_type != OperationType::Insert {
        return Err(PersistError::Internal(format!(
            "unexpected change stream operation: {:?}",
            event.operation_type
        )));
    }

    let coll = event
        .ns
        .and_then(|ns| ns.coll)
        .ok_or_else(|| PersistError::Internal("insert event without namespace".to_string()))?;
    let Some(collection) = watched_collection(&coll) else {
        return Ok(None);
    };

    let full_document = event
        .full_document
        .ok_or_else(|| PersistError::Internal("insert event without fullDocument".to_string()))?;

    Ok(Some(DocumentCreated::new(snapshot_from_bson(&collection, full_document)?)))
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn add_message(&self, collection: &CollectionPath, message: Message) -> Result<DocumentPath> {
        let mongo_message: MongoMessage = message.into();
        self.database
            .collection::<MongoMessage>(&collection.to_string())
            .insert_one(&mongo_message)
            .await?;
        collection.doc(&mongo_message.id.to_hex())
    }

    async fn insert_raw(
        &self,
        collection: &CollectionPath,
        data: Map<String, Value>,
    ) -> Result<DocumentPath> {
        let document = bson::to_document(&data)?;
        let result = self
            .database
            .collection::<Document>(&collection.to_string())
            .insert_one(document)
            .await?;
        collection.doc(&id_to_segment(&result.inserted_id))
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<DocumentSnapshot>> {
        let documents: Vec<Document> = self
            .database
            .collection::<Document>(&collection.to_string())
            .find(doc! {})
            .sort(doc! { "createdAt": 1 })
            .await?
            .try_collect()
            .await?;

        documents
            .into_iter()
            .map(|doc| snapshot_from_bson(collection, doc))
            .collect()
    }
}

#[async_trait]
impl ChangeFeed for MongoStore {
    async fn subscribe(&self) -> Result<CreatedStream> {
        let stream = self.database.watch().pipeline(self.pipeline()).await?;
        tracing::info!(
            database = %self.database.name(),
            filter = ?self.collection_filter,
            "Change stream opened"
        );

        let events = stream.filter_map(|event| {
            future::ready(
                event
                    .map_err(PersistError::from)
                    .and_then(created_from_event)
                    .transpose(),
            )
        });
        Ok(Box::pin(events))
    }
}
