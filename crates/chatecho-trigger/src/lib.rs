pub mod error;
pub mod pattern;
pub mod handler;
pub mod echo;
pub mod builder;
pub mod runtime;

pub use error::{Result, TriggerError};
pub use pattern::{PathParams, PathPattern};
pub use handler::TriggerHandler;
pub use echo::{echo_text, EchoHandler, ECHO_PREFIX, MESSAGE_PATTERN};
pub use builder::TriggerRuntimeBuilder;
pub use runtime::{RunStats, TriggerRuntime};
