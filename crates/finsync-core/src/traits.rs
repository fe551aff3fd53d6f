//! Core traits for finsync abstractions.
//!
//! These traits define the seams between the pipeline stages and their
//! collaborators (storage, banking providers, model backends), enabling
//! pluggable backends and testability against in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORAGE REPOSITORIES
// =============================================================================

/// Repository for bank connections. The orchestrator is the only writer.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Fetch a connection by id.
    async fn fetch(&self, id: Uuid) -> Result<BankConnection>;

    /// List all connections owned by a tenant.
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<BankConnection>>;

    /// Mark the connection connected and touch its last-accessed timestamp.
    async fn mark_connected(&self, id: Uuid) -> Result<()>;

    /// Mark the connection disconnected. Last-accessed is left untouched.
    async fn mark_disconnected(&self, id: Uuid) -> Result<()>;
}

/// Repository for bank accounts. Mutated by the account sync worker.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fetch an account by id.
    async fn fetch(&self, id: Uuid) -> Result<BankAccount>;

    /// List accounts under a connection eligible for a sync cycle:
    /// enabled, non-manual, and — unless `include_quarantined` (manual
    /// sync) — with an error count below the quarantine threshold.
    async fn list_syncable(
        &self,
        connection_id: Uuid,
        include_quarantined: bool,
    ) -> Result<Vec<BankAccount>>;

    /// List all enabled non-manual accounts under a connection, regardless
    /// of error count. Used by the post-fan-out escalation check.
    async fn list_background(&self, connection_id: Uuid) -> Result<Vec<BankAccount>>;

    /// Persist a balance snapshot.
    async fn update_balance(&self, id: Uuid, balance: ProviderBalance) -> Result<()>;

    /// Reset the consecutive-error counter and clear the error detail.
    async fn clear_error(&self, id: Uuid) -> Result<()>;

    /// Increment the consecutive-error counter and persist the detail.
    async fn record_error(&self, id: Uuid, detail: &str) -> Result<()>;

    /// Best-effort backfill of static fields missing from legacy rows.
    /// Only fills columns that are currently NULL; first write wins.
    async fn backfill_details(&self, connection_id: Uuid, details: &AccountDetails) -> Result<()>;
}

/// Repository for transactions.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Bulk upsert with duplicate-ignore semantics keyed on the dedup key.
    /// Existing rows are left untouched; returns the ids of newly inserted
    /// rows only.
    async fn upsert_batch(&self, rows: &[NewTransaction]) -> Result<Vec<Uuid>>;

    /// Fetch, out of the given ids, the transactions that do not yet have
    /// an embedding record.
    async fn fetch_unembedded(&self, ids: &[Uuid]) -> Result<Vec<Transaction>>;

    /// Mark all of a tenant's un-notified transactions as notified.
    /// Returns how many rows flipped.
    async fn mark_notified(&self, tenant_id: Uuid) -> Result<i64>;
}

/// Repository for transaction embeddings.
#[async_trait]
pub trait TransactionEmbeddingRepository: Send + Sync {
    /// Insert embedding rows. An existing row for the same transaction is
    /// logically replaced.
    async fn insert_batch(&self, rows: Vec<NewTransactionEmbedding>) -> Result<()>;

    /// Count embeddings for a tenant (used by tests and health checks).
    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64>;
}

/// Registration store for recurring per-tenant schedules.
///
/// `ensure` must be an idempotent upsert keyed by the deduplication key;
/// in-memory uniqueness is never relied upon.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Create the registration if absent. Returns `true` when a row was
    /// created, `false` when one already existed.
    async fn ensure(&self, registration: NewScheduleRegistration) -> Result<bool>;

    /// Delete by deduplication key. Already-absent is success.
    async fn remove(&self, dedup_key: &str) -> Result<()>;

    /// Look up a registration by deduplication key.
    async fn find(&self, dedup_key: &str) -> Result<Option<ScheduleRegistration>>;

    /// List all registrations for a task name.
    async fn list_for_task(&self, task: &str) -> Result<Vec<ScheduleRegistration>>;
}

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Durable job queue with deferred visibility.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job. `delay` defers visibility to workers.
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Uuid>;

    /// Enqueue unless a pending/running job of the same type already exists
    /// for the tenant. Returns `None` when deduplicated away.
    async fn enqueue_deduplicated(
        &self,
        tenant_id: Uuid,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Option<Uuid>>;

    /// Claim the next visible pending job of one of the given types.
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Mark a job completed.
    async fn complete(&self, job_id: Uuid) -> Result<()>;

    /// Mark a job failed. Re-queues as pending while the retry budget
    /// lasts, otherwise terminal failure.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Fetch a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Number of pending jobs.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// EXTERNAL CLIENTS
// =============================================================================

/// Client for the opaque banking engine. Implementations classify every
/// failure into a [`crate::ProviderErrorKind`] before it leaves this layer.
#[async_trait]
pub trait BankProviderClient: Send + Sync {
    /// Probe the live status of a connection. Also surfaces static account
    /// details usable for best-effort backfill.
    async fn connection_status(
        &self,
        reference_id: &str,
        provider: BankProvider,
        access_token: &str,
    ) -> Result<ConnectionProbe>;

    /// Fetch the current balance for an account. `None` means the provider
    /// has no balance data; zero and negative amounts are real balances.
    async fn account_balance(
        &self,
        external_id: &str,
        provider: BankProvider,
        access_token: &str,
        account_type: AccountType,
    ) -> Result<Option<ProviderBalance>>;

    /// Fetch transactions for an account. `latest_only` restricts to the
    /// incremental window; manual syncs fetch all available history.
    async fn transactions(
        &self,
        external_id: &str,
        provider: BankProvider,
        access_token: &str,
        classification: AccountClassification,
        latest_only: bool,
    ) -> Result<Vec<RawTransaction>>;
}

/// Result of a connection status probe.
#[derive(Debug, Clone)]
pub struct ConnectionProbe {
    pub status: ConnectionStatus,
    /// Static details for best-effort account backfill; may be empty.
    pub account_details: Vec<AccountDetails>,
}

/// Batch-oriented embedding model backend. The returned vector count must
/// equal the input text count; callers treat a mismatch as a hard error.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// The embedding dimension this backend produces.
    fn dimension(&self) -> usize;

    /// Model identifier recorded with each embedding.
    fn model_name(&self) -> &str;
}

/// Best-effort LLM enrichment backend. Writes categorization directly to
/// storage; callers swallow failures.
#[async_trait]
pub trait EnrichmentBackend: Send + Sync {
    /// Enrich the given transactions for a tenant.
    async fn enrich(&self, transaction_ids: &[Uuid], tenant_id: Uuid) -> Result<()>;
}
