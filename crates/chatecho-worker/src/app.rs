use std::sync::Arc;

use chatecho_persist::DocumentStore;
use chatecho_trigger::{EchoHandler, Result, TriggerRuntime};

use crate::config::TriggerConfig;

/// Wire the echo handler onto `store` with the configured host limits.
pub fn build_runtime(config: &TriggerConfig, store: Arc<dyn DocumentStore>) -> Result<TriggerRuntime> {
    let mut builder = TriggerRuntime::builder()
        .on_create(EchoHandler::pattern()?, Arc::new(EchoHandler::new(store)))
        .max_concurrent_invocations(config.max_concurrent_invocations);

    if let Some(timeout) = config.invocation_timeout() {
        builder = builder.invocation_timeout(timeout);
    }

    builder.build()
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
