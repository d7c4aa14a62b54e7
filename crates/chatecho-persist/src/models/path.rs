use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};

pub const CHATS_COLLECTION: &str = "chats";
pub const MESSAGES_COLLECTION: &str = "messages";

/// Path of a collection: an odd number of segments, e.g. `chats/u1/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath {
    segments: Vec<String>,
}

/// Path of a single document: an even number of segments, e.g. `chats/u1/messages/m1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath {
    segments: Vec<String>,
}

fn split(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(PersistError::InvalidPath(format!("empty segment in '{}'", path)));
    }
    Ok(segments)
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(PersistError::InvalidPath(format!("invalid segment '{}'", segment)));
    }
    Ok(())
}

impl CollectionPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 == 0 {
            return Err(PersistError::InvalidPath(format!(
                "'{}' has an even number of segments and names a document",
                path
            )));
        }
        Ok(Self { segments })
    }

    /// Path of a document in this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        check_segment(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(DocumentPath { segments })
    }

    /// Last segment, i.e. the collection's own name.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl DocumentPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 != 0 {
            return Err(PersistError::InvalidPath(format!(
                "'{}' has an odd number of segments and names a collection",
                path
            )));
        }
        Ok(Self { segments })
    }

    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// `chats/{user_id}/messages`
pub fn chat_messages(user_id: &str) -> Result<CollectionPath> {
    check_segment(user_id)?;
    Ok(CollectionPath {
        segments: vec![
            CHATS_COLLECTION.to_string(),
            user_id.to_string(),
            MESSAGES_COLLECTION.to_string(),
        ],
    })
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for CollectionPath {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for DocumentPath {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = PersistError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = PersistError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(path: CollectionPath) -> Self {
        path.to_string()
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}
