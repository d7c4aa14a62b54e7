use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::MessageView;
use super::path::DocumentPath;

/// A stored document: where it lives and its raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    pub data: Map<String, Value>,
}

impl DocumentSnapshot {
    pub fn new(path: DocumentPath, data: Map<String, Value>) -> Self {
        Self { path, data }
    }

    /// Interpret the fields as a chat message.
    pub fn message(&self) -> MessageView<'_> {
        MessageView::new(&self.data)
    }
}

/// Change-feed event emitted once for every newly created document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCreated {
    pub snapshot: DocumentSnapshot,
    pub observed_at: DateTime<Utc>,
}

impl DocumentCreated {
    pub fn new(snapshot: DocumentSnapshot) -> Self {
        Self {
            snapshot,
            observed_at: Utc::now(),
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.snapshot.path
    }
}
