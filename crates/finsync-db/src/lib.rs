//! # finsync-db
//!
//! PostgreSQL storage layer for finsync.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for connections, accounts, transactions,
//!   embeddings, schedule registrations, and the job queue
//! - Duplicate-ignore bulk transaction upsert keyed on the dedup key
//! - pgvector storage for transaction embeddings
//!
//! ## Example
//!
//! ```rust,ignore
//! use finsync_db::Database;
//! use finsync_core::ConnectionRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/finsync").await?;
//!     let connections = db.connections.list_for_tenant(tenant_id).await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod connections;
pub mod embeddings;
pub mod jobs;
pub mod pool;
pub mod schedules;
pub mod transactions;

// Re-export core types
pub use finsync_core::*;

// Re-export repository implementations
pub use accounts::PgAccountRepository;
pub use connections::PgConnectionRepository;
pub use embeddings::PgTransactionEmbeddingRepository;
pub use jobs::PgJobQueue;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use schedules::PgScheduleRepository;
pub use transactions::PgTransactionRepository;

/// Aggregate handle over all finsync repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Bank connection repository.
    pub connections: PgConnectionRepository,
    /// Bank account repository.
    pub accounts: PgAccountRepository,
    /// Transaction repository.
    pub transactions: PgTransactionRepository,
    /// Transaction embedding repository (pgvector).
    pub embeddings: PgTransactionEmbeddingRepository,
    /// Schedule registration repository.
    pub schedules: PgScheduleRepository,
    /// Durable job queue.
    pub jobs: PgJobQueue,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            connections: PgConnectionRepository::new(pool.clone()),
            accounts: PgAccountRepository::new(pool.clone()),
            transactions: PgTransactionRepository::new(pool.clone()),
            embeddings: PgTransactionEmbeddingRepository::new(pool.clone()),
            schedules: PgScheduleRepository::new(pool.clone()),
            jobs: PgJobQueue::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
