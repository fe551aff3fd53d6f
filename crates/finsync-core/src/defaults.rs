//! Centralized default constants for the finsync pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// SYNC THRESHOLDS
// =============================================================================

/// Consecutive-error count at or above which an account is quarantined
/// from background sync cycles. Manual syncs bypass quarantine.
pub const QUARANTINE_THRESHOLD: i32 = 4;

/// Consecutive-error count at or above which an account counts toward
/// connection-level disconnection. The connection is disconnected only
/// when *every* enabled non-manual account is at or above this.
pub const ESCALATION_THRESHOLD: i32 = 3;

// =============================================================================
// FAN-OUT THROTTLING
// =============================================================================

/// Inter-account dispatch delay for manual (user-initiated) syncs.
pub const MANUAL_SYNC_STAGGER_SECS: u64 = 30;

/// Inter-account dispatch delay for background sync cycles.
pub const BACKGROUND_SYNC_STAGGER_SECS: u64 = 60;

/// Delay before the batched new-transactions notification fires.
pub const NOTIFICATION_DELAY_SECS: u64 = 300;

// =============================================================================
// BATCHING
// =============================================================================

/// Maximum transactions per bulk upsert batch.
pub const UPSERT_BATCH_SIZE: usize = 500;

/// Maximum transactions per embedding model call.
pub const EMBED_BATCH_SIZE: usize = 50;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension.
pub const EMBED_DIMENSION: usize = 768;

/// Default embedding service endpoint.
pub const EMBED_URL: &str = "http://localhost:11434";

/// Default enrichment service endpoint.
pub const ENRICH_URL: &str = "http://localhost:8091";

/// HTTP timeout for one embedding batch request (seconds).
pub const EMBED_REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP timeout for one enrichment request (seconds).
pub const ENRICH_REQUEST_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// PROVIDER ENGINE
// =============================================================================

/// Default banking engine endpoint.
pub const ENGINE_URL: &str = "http://localhost:8090";

/// HTTP timeout for provider engine calls (seconds).
pub const ENGINE_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// JOBS
// =============================================================================

/// Maximum retries for failed pipeline jobs.
pub const JOB_MAX_RETRIES: i32 = 2;

/// Maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Polling interval when the queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Poll interval when waiting on fan-out children (milliseconds).
pub const CHILD_POLL_INTERVAL_MS: u64 = 1000;

/// Worker event bus capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// Per-stage invocation budgets (seconds).
pub const TENANT_SYNC_TIMEOUT_SECS: u64 = 60;
pub const CONNECTION_SYNC_TIMEOUT_SECS: u64 = 300;
pub const ACCOUNT_SYNC_TIMEOUT_SECS: u64 = 120;
pub const EMBED_TIMEOUT_SECS: u64 = 120;
pub const NOTIFY_TIMEOUT_SECS: u64 = 60;

/// Slice of the connection sync budget reserved for the post-fan-out
/// health check; the child wait must give it up in time.
pub const CHILD_WAIT_MARGIN_SECS: u64 = 30;

// =============================================================================
// SCHEDULING
// =============================================================================

/// Task name for the recurring per-tenant bank sync registration.
pub const BANK_SYNC_TASK: &str = "bank-sync";

/// Timezone for all schedule registrations.
pub const SCHEDULE_TIMEZONE: &str = "UTC";
