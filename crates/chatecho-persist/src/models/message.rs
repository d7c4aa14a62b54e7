use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const TEXT_FIELD: &str = "text";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const IS_USER_MESSAGE_FIELD: &str = "isUserMessage";

/// Who authored a message.
///
/// Stored on the wire as the `isUserMessage` boolean: `true` for [`Origin::User`],
/// `false` for [`Origin::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Written by a human through the client.
    User,
    /// Written by an automated handler (the echo reply).
    System,
}

impl Origin {
    /// Interpret a raw `isUserMessage` field the way a loosely typed client would:
    /// any truthy value is a user message, anything else (including absence) is not.
    pub fn from_flag(flag: Option<&Value>) -> Self {
        if is_truthy(flag) {
            Origin::User
        } else {
            Origin::System
        }
    }

    pub fn is_user_message(self) -> bool {
        matches!(self, Origin::User)
    }
}

impl From<bool> for Origin {
    fn from(is_user_message: bool) -> Self {
        if is_user_message {
            Origin::User
        } else {
            Origin::System
        }
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_user_message())
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        bool::deserialize(deserializer).map(Origin::from)
    }
}

/// A chat message as written by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isUserMessage")]
    pub origin: Origin,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Utc::now(),
            origin: Origin::User,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: Utc::now(),
            origin: Origin::System,
        }
    }

    /// Field map used by schemaless backends.
    pub fn to_fields(&self) -> crate::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(crate::PersistError::Internal(format!(
                "message serialized to non-object: {other}"
            ))),
        }
    }
}

/// Read-only view over the raw fields of a message document.
///
/// Documents are schemaless, so every accessor tolerates missing or mistyped fields.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> MessageView<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn origin(&self) -> Origin {
        Origin::from_flag(self.fields.get(IS_USER_MESSAGE_FIELD))
    }

    /// `text` rendered the way string interpolation coerces it: absent becomes
    /// `undefined`, objects `[object Object]`, arrays their comma-joined elements.
    pub fn text(&self) -> Cow<'a, str> {
        match self.fields.get(TEXT_FIELD) {
            None => Cow::Borrowed("undefined"),
            Some(Value::String(text)) => Cow::Borrowed(text.as_str()),
            Some(Value::Null) => Cow::Borrowed("null"),
            Some(other) => Cow::Owned(coerce(other)),
        }
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => format_number(number),
        Value::String(text) => text.clone(),
        // Nulls inside arrays join as empty strings
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_number(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        // `-0` prints as `0`
        Some(n) if n == 0.0 => "0".to_string(),
        // f64 `Display` drops the trailing `.0` of integral values
        Some(n) => n.to_string(),
        None => number.to_string(),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map_or(true, |n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
