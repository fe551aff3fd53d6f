//! finsync worker binary.
//!
//! Connects to Postgres, runs migrations, wires the live provider and
//! model backends, and processes sync jobs until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use finsync_core::ExecutionEnvironment;
use finsync_db::{
    Database, PgAccountRepository, PgConnectionRepository, PgScheduleRepository,
    PgTransactionEmbeddingRepository, PgTransactionRepository,
};
use finsync_inference::{HttpEmbedder, HttpEnricher};
use finsync_jobs::{
    AccountSyncHandler, ConnectionSyncHandler, SyncContext, TenantSyncHandler,
    TransactionEmbedHandler, TransactionNotifyHandler, WorkerBuilder, WorkerConfig,
};
use finsync_providers::EngineClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = Database::connect(&database_url)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;

    let environment = ExecutionEnvironment::from_env();
    info!(%environment, "Starting finsync worker");

    let queue = Arc::new(db.jobs.clone());
    let ctx = SyncContext {
        connections: Arc::new(PgConnectionRepository::new(db.pool().clone())),
        accounts: Arc::new(PgAccountRepository::new(db.pool().clone())),
        transactions: Arc::new(PgTransactionRepository::new(db.pool().clone())),
        embeddings: Arc::new(PgTransactionEmbeddingRepository::new(db.pool().clone())),
        schedules: Arc::new(PgScheduleRepository::new(db.pool().clone())),
        queue: queue.clone(),
        provider: Arc::new(EngineClient::from_env().context("provider engine client")?),
        embedder: Arc::new(HttpEmbedder::from_env().context("embedding backend")?),
        enricher: Arc::new(HttpEnricher::from_env().context("enrichment backend")?),
        environment,
    };

    let worker = WorkerBuilder::new(queue)
        .with_config(WorkerConfig::from_env())
        .with_handler(TenantSyncHandler::new(ctx.clone()))
        .with_handler(ConnectionSyncHandler::new(ctx.clone()))
        .with_handler(AccountSyncHandler::new(ctx.clone()))
        .with_handler(TransactionEmbedHandler::new(ctx.clone()))
        .with_handler(TransactionNotifyHandler::new(ctx))
        .build()
        .await;

    let handle = worker.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    handle.shutdown().await?;

    Ok(())
}
