//! Structured logging schema and field name constants for finsync.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), sync stage completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (transactions, batches) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "providers", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "engine", "embedder", "pool", "worker", "scheduler"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "sync_connection", "upsert_batch", "embed_texts", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Tenant UUID the event belongs to.
pub const TENANT_ID: &str = "tenant_id";

/// Bank connection UUID being synced.
pub const CONNECTION_ID: &str = "connection_id";

/// Bank account UUID being synced.
pub const ACCOUNT_ID: &str = "account_id";

/// Banking provider name ("plaid", "gocardless", "teller", "enablebanking").
pub const PROVIDER: &str = "provider";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of accounts fanned out in a sync cycle.
pub const ACCOUNT_COUNT: &str = "account_count";

/// Number of transactions fetched from the provider.
pub const FETCHED_COUNT: &str = "fetched_count";

/// Number of transactions newly inserted by an upsert batch.
pub const INSERTED_COUNT: &str = "inserted_count";

/// Number of input texts sent to the embedding model.
pub const INPUT_COUNT: &str = "input_count";

/// Batch ordinal within a batched operation.
pub const BATCH_INDEX: &str = "batch_index";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for embedding or enrichment.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Provider error classification when a provider call fails.
pub const ERROR_KIND: &str = "error_kind";
