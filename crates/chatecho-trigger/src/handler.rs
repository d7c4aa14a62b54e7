use async_trait::async_trait;
use chatecho_persist::DocumentCreated;

use crate::error::Result;
use crate::pattern::PathParams;

/// Reaction to a newly created document.
///
/// Invoked once per creation event whose path matches the pattern the handler
/// was registered under. Invocations may run concurrently.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_create(&self, event: &DocumentCreated, params: &PathParams) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &str;
}
