mod message;
mod path;
mod snapshot;

pub use message::{Message, MessageView, Origin};
pub use path::{chat_messages, CollectionPath, DocumentPath, CHATS_COLLECTION, MESSAGES_COLLECTION};
pub use snapshot::{DocumentCreated, DocumentSnapshot};
