use std::sync::Arc;

use chatecho_persist::{MongoStore, MongoStoreOptions};
use chatecho_worker::{
    app::{build_runtime, shutdown_signal},
    config::Config,
    logging::init_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging);

    tracing::info!("Starting chatecho worker");

    // One connection for the whole process, shared by the feed and the handler
    tracing::info!("Connecting to MongoDB");
    let mut options = MongoStoreOptions::new(&config.mongodb.database).timeout(config.mongodb.timeout());
    if let Some(filter) = &config.mongodb.collection_filter {
        options = options.collection_filter(filter);
    }
    let store = Arc::new(MongoStore::connect(&config.mongodb_uri, options).await?);
    store.ping().await?;
    tracing::info!(database = %config.mongodb.database, "MongoDB connected");

    let runtime = build_runtime(&config.trigger, store.clone())?;

    let stats = runtime.run(&*store, shutdown_signal()).await?;

    tracing::info!(
        dispatched = stats.dispatched,
        failed = stats.failed,
        "Worker stopped"
    );
    Ok(())
}
