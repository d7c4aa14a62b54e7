use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chatecho_persist::{ChangeFeed, DocumentCreated, PersistError};
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::builder::TriggerRuntimeBuilder;
use crate::error::{Result, TriggerError};
use crate::handler::TriggerHandler;
use crate::pattern::PathPattern;

pub(crate) struct Registration {
    pub(crate) pattern: PathPattern,
    pub(crate) handler: Arc<dyn TriggerHandler>,
}

/// Counters for one run of the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Handler invocations started
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Events that matched no registered pattern
    pub skipped: u64,
}

impl RunStats {
    fn record(&mut self, joined: std::result::Result<Result<()>, JoinError>) {
        match joined {
            Ok(Ok(())) => self.succeeded += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                tracing::error!(error = %TriggerError::Panicked(e.to_string()), "Invocation aborted");
                self.failed += 1;
            }
        }
    }
}

/// Dispatches creation events to registered handlers.
///
/// Each matching (event, handler) pair runs as its own tokio task. Failed
/// invocations are logged and counted, never retried.
pub struct TriggerRuntime {
    registrations: Vec<Registration>,
    limiter: Arc<Semaphore>,
    invocation_timeout: Option<Duration>,
}

impl TriggerRuntime {
    pub(crate) fn new(
        registrations: Vec<Registration>,
        max_concurrent_invocations: usize,
        invocation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registrations,
            limiter: Arc::new(Semaphore::new(max_concurrent_invocations)),
            invocation_timeout,
        }
    }

    /// Create a builder for fluent construction
    pub fn builder() -> TriggerRuntimeBuilder {
        TriggerRuntimeBuilder::new()
    }

    /// Subscribe to `feed` and dispatch until `shutdown` resolves or the feed ends.
    pub async fn run<F>(&self, feed: &dyn ChangeFeed, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()> + Send,
    {
        let events = feed.subscribe().await.map_err(TriggerError::Feed)?;
        self.run_stream(events, shutdown).await
    }

    /// Dispatch events from an already-open stream.
    ///
    /// Returns once `shutdown` resolves or the stream ends, after all in-flight
    /// invocations have finished. A stream error stops the run.
    pub async fn run_stream<S, F>(&self, mut events: S, shutdown: F) -> Result<RunStats>
    where
        S: Stream<Item = std::result::Result<DocumentCreated, PersistError>> + Unpin + Send,
        F: Future<Output = ()> + Send,
    {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        let mut stats = RunStats::default();
        tokio::pin!(shutdown);

        tracing::info!(triggers = self.registrations.len(), "Trigger runtime started");

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break Ok(());
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.record(joined);
                }
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        if !self.dispatch(event, &mut tasks, &mut stats, shutdown.as_mut()).await {
                            tracing::info!("Shutdown requested while waiting for a free slot");
                            break Ok(());
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Change feed failed");
                        break Err(TriggerError::Feed(e));
                    }
                    None => {
                        tracing::info!("Change feed closed");
                        break Ok(());
                    }
                },
            }
        };

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "Waiting for in-flight invocations");
        }
        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
        }

        tracing::info!(
            dispatched = stats.dispatched,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Trigger runtime stopped"
        );

        outcome.map(|_| stats)
    }

    /// Spawn an invocation per matching registration. Returns `false` when
    /// `shutdown` resolved while waiting for a concurrency slot.
    async fn dispatch<F>(
        &self,
        event: DocumentCreated,
        tasks: &mut JoinSet<Result<()>>,
        stats: &mut RunStats,
        mut shutdown: Pin<&mut F>,
    ) -> bool
    where
        F: Future<Output = ()>,
    {
        let event = Arc::new(event);
        let mut matched = false;

        for registration in &self.registrations {
            let Some(params) = registration.pattern.matches(event.path()) else {
                continue;
            };
            matched = true;

            // Back-pressure: stop reading the feed while every slot is busy
            let permit = tokio::select! {
                acquired = self.limiter.clone().acquire_owned() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => return true,
                },
                _ = &mut shutdown => return false,
            };

            let handler = Arc::clone(&registration.handler);
            let event = Arc::clone(&event);
            let timeout = self.invocation_timeout;
            stats.dispatched += 1;

            tasks.spawn(async move {
                let _permit = permit;
                let start = Instant::now();
                let invocation = handler.on_create(&event, &params);

                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, invocation)
                        .await
                        .unwrap_or_else(|_| Err(TriggerError::Timeout(limit))),
                    None => invocation.await,
                };

                let duration_ms = start.elapsed().as_millis() as u64;
                match &result {
                    Ok(()) => tracing::debug!(
                        handler = handler.name(),
                        path = %event.path(),
                        duration_ms,
                        "Invocation succeeded"
                    ),
                    Err(e) => tracing::error!(
                        handler = handler.name(),
                        path = %event.path(),
                        duration_ms,
                        error = %e,
                        "Invocation failed"
                    ),
                }
                result
            });
        }

        if !matched {
            stats.skipped += 1;
            tracing::debug!(path = %event.path(), "No trigger matches, skipping");
        }
        true
    }
}
