use std::time::Duration;

use chatecho_persist::PersistError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriggerError {
    /// The one failure class a handler can produce: its store write failed.
    #[error("Write failed: {0}")]
    Write(#[from] PersistError),

    #[error("Change feed error: {0}")]
    Feed(PersistError),

    #[error("Invalid path pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing path parameter: {0}")]
    MissingParam(String),

    #[error("Invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invocation panicked: {0}")]
    Panicked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TriggerError>;
