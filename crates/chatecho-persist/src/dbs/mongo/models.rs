use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PersistError, Result};
use crate::models::{CollectionPath, DocumentSnapshot, Message, Origin};

/// MongoDB-specific Message model (uses ObjectId and a native BSON date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    #[serde(
        rename = "createdAt",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isUserMessage")]
    pub is_user_message: bool,
}

impl From<Message> for MongoMessage {
    fn from(msg: Message) -> Self {
        Self {
            id: ObjectId::new(),
            text: msg.text,
            created_at: msg.created_at,
            is_user_message: msg.origin.is_user_message(),
        }
    }
}

impl From<MongoMessage> for Message {
    fn from(msg: MongoMessage) -> Self {
        Self {
            text: msg.text,
            created_at: msg.created_at,
            origin: Origin::from(msg.is_user_message),
        }
    }
}

/// Render a document `_id` as a path segment.
pub fn id_to_segment(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a raw BSON document into a snapshot under `collection`.
///
/// `_id` becomes the last path segment; the remaining fields are exposed as
/// relaxed extended JSON.
pub fn snapshot_from_bson(collection: &CollectionPath, mut doc: Document) -> Result<DocumentSnapshot> {
    let id = doc
        .remove("_id")
        .ok_or_else(|| PersistError::Internal(format!("document in {} has no _id", collection)))?;
    let path = collection.doc(&id_to_segment(&id))?;

    let data = match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };

    Ok(DocumentSnapshot::new(path, data))
}
