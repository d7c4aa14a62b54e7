pub mod client;
pub mod models;

pub use client::{MongoStore, MongoStoreOptions};
pub use models::MongoMessage;
