//! # finsync-jobs
//!
//! Background bank-sync pipeline for finsync.
//!
//! This crate provides:
//! - The sync job handlers: tenant fan-out, connection orchestration,
//!   per-account sync, transaction embedding, and deferred notification
//! - Per-tenant recurring schedule registration
//! - Async job processing with concurrent workers and per-stage timeouts
//! - Retry logic with configurable limits
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use finsync_jobs::{SyncContext, TenantSyncHandler, WorkerBuilder, WorkerConfig};
//! use finsync_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let queue = Arc::new(db.jobs);
//!
//! // Create worker with handlers
//! let worker = WorkerBuilder::new(queue)
//!     .with_config(WorkerConfig::default().with_poll_interval(1000))
//!     .with_handler(TenantSyncHandler::new(ctx.clone()))
//!     .build()
//!     .await;
//!
//! // Start worker and get handle
//! let handle = worker.start();
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod context;
pub mod embed;
pub mod handler;
pub mod notify;
pub mod scheduler;
pub mod sync_account;
pub mod sync_connection;
pub mod testing;
pub mod upsert;
pub mod worker;

// Re-export core types
pub use finsync_core::*;

// Re-export pipeline types
pub use context::SyncContext;
pub use embed::TransactionEmbedHandler;
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use notify::TransactionNotifyHandler;
pub use scheduler::{SchedulerRegistrar, TenantSyncHandler};
pub use sync_account::AccountSyncHandler;
pub use sync_connection::ConnectionSyncHandler;
pub use upsert::UpsertStage;
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default maximum retries for failed jobs.
pub const DEFAULT_MAX_RETRIES: i32 = finsync_core::defaults::JOB_MAX_RETRIES;

/// Default polling interval for job processing (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = finsync_core::defaults::JOB_POLL_INTERVAL_MS;
