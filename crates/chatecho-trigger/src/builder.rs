use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TriggerError};
use crate::handler::TriggerHandler;
use crate::pattern::PathPattern;
use crate::runtime::{Registration, TriggerRuntime};

const DEFAULT_MAX_CONCURRENT_INVOCATIONS: usize = 64;

/// Builder for constructing a [`TriggerRuntime`]
pub struct TriggerRuntimeBuilder {
    registrations: Vec<Registration>,
    max_concurrent_invocations: usize,
    invocation_timeout: Option<Duration>,
}

impl TriggerRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            max_concurrent_invocations: DEFAULT_MAX_CONCURRENT_INVOCATIONS,
            invocation_timeout: None,
        }
    }

    /// Invoke `handler` for every created document whose path matches `pattern`
    pub fn on_create(mut self, pattern: PathPattern, handler: Arc<dyn TriggerHandler>) -> Self {
        self.registrations.push(Registration { pattern, handler });
        self
    }

    pub fn max_concurrent_invocations(mut self, max: usize) -> Self {
        self.max_concurrent_invocations = max;
        self
    }

    /// Upper bound on a single invocation; unbounded when unset
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TriggerRuntime> {
        if self.registrations.is_empty() {
            return Err(TriggerError::Config("no triggers registered".to_string()));
        }
        if self.max_concurrent_invocations == 0 {
            return Err(TriggerError::Config(
                "max_concurrent_invocations must be at least 1".to_string(),
            ));
        }
        if self.invocation_timeout == Some(Duration::ZERO) {
            return Err(TriggerError::Config(
                "invocation_timeout must be positive".to_string(),
            ));
        }

        Ok(TriggerRuntime::new(
            self.registrations,
            self.max_concurrent_invocations,
            self.invocation_timeout,
        ))
    }
}

impl Default for TriggerRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
