// Main entry point for the scrape coordinator

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use handoff::InProcessQueue;
use scrape_engine::fetch::{Fetcher, HttpFetcher};
use scrape_engine::service::CoordinatorKernel;
use scrape_engine::store::{JobStore, MemoryStore, PageStore, PostgresStore, TargetStore};
use scrape_engine::worker::{drain_workers, spawn_fetch_workers, WorkerPoolConfig};
use scrape_engine::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scrape_engine=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Scrape Coordinator");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Storage: Postgres when DATABASE_URL is set, in-memory otherwise
    let (target_store, job_store, page_store): (
        Arc<dyn TargetStore>,
        Arc<dyn JobStore>,
        Arc<dyn PageStore>,
    ) = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");

            let store = Arc::new(PostgresStore::new(pool));
            (store.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (state is lost on exit)");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store.clone(), store)
        }
    };

    let queue = Arc::new(InProcessQueue::new());
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new().context("Failed to create fetcher")?);

    let kernel = Arc::new(CoordinatorKernel::new(
        target_store,
        job_store,
        page_store,
        queue.clone(),
        fetcher,
    ));

    // Spawn the worker pool
    let pool_config = WorkerPoolConfig {
        workers: config.worker_count,
        engine: config.fetch_engine,
        drain_timeout: Duration::from_secs(config.drain_timeout_secs),
    };
    tracing::info!(
        workers = pool_config.workers,
        engine = %pool_config.engine,
        "Spawning fetch workers"
    );
    let shutdown = CancellationToken::new();
    let handles = spawn_fetch_workers(kernel, &pool_config, &shutdown);

    // Run until ctrl-c, then drain
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, draining workers");

    shutdown.cancel();
    queue.close().await;
    drain_workers(handles, pool_config.drain_timeout).await;

    tracing::info!("Scrape Coordinator stopped");
    Ok(())
}
