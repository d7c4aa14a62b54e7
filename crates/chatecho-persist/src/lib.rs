pub mod models;
pub mod trait_client;
pub mod dbs;
pub mod error;

pub use models::{
    chat_messages, CollectionPath, DocumentCreated, DocumentPath, DocumentSnapshot, Message,
    MessageView, Origin, CHATS_COLLECTION, MESSAGES_COLLECTION,
};
pub use trait_client::{ChangeFeed, CreatedStream, DocumentStore};
pub use dbs::memory::InMemoryStore;
pub use error::{PersistError, Result};

#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoStore, MongoStoreOptions};
