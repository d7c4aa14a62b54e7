use std::sync::Arc;

use async_trait::async_trait;
use chatecho_persist::{chat_messages, DocumentCreated, DocumentStore, Message, Origin};

use crate::error::Result;
use crate::handler::TriggerHandler;
use crate::pattern::{PathParams, PathPattern};

pub const ECHO_PREFIX: &str = "You said: ";
pub const MESSAGE_PATTERN: &str = "chats/{userId}/messages/{messageId}";

pub fn echo_text(original: &str) -> String {
    format!("{}{}", ECHO_PREFIX, original)
}

/// Replies to every user-authored chat message with `You said: <text>`.
///
/// Replies are written with [`Origin::System`], so the creation event they
/// cause is ignored by this same handler.
pub struct EchoHandler {
    store: Arc<dyn DocumentStore>,
}

impl EchoHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The pattern this handler expects to be registered under.
    pub fn pattern() -> Result<PathPattern> {
        PathPattern::parse(MESSAGE_PATTERN)
    }
}

#[async_trait]
impl TriggerHandler for EchoHandler {
    async fn on_create(&self, event: &DocumentCreated, params: &PathParams) -> Result<()> {
        let message = event.snapshot.message();

        if !matches!(message.origin(), Origin::User) {
            tracing::debug!(path = %event.path(), "Not a user message, skipping");
            return Ok(());
        }

        let user_id = params.require("userId")?;
        let collection = chat_messages(user_id)?;
        let reply = Message::system(echo_text(&message.text()));

        let reply_path = self.store.add_message(&collection, reply).await?;

        tracing::info!(
            user_id = %user_id,
            source = %event.path(),
            reply = %reply_path,
            "Echo written"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "echo"
    }
}
