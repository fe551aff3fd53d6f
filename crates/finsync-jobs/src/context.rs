//! Shared collaborator bundle for pipeline handlers.

use std::sync::Arc;

use finsync_core::{
    AccountRepository, BankProviderClient, ConnectionRepository, EmbeddingBackend,
    EnrichmentBackend, ExecutionEnvironment, JobQueue, ScheduleRepository,
    TransactionEmbeddingRepository, TransactionRepository,
};

/// Everything a sync stage may need, behind trait objects so tests can
/// swap in in-memory fakes.
#[derive(Clone)]
pub struct SyncContext {
    pub connections: Arc<dyn ConnectionRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub embeddings: Arc<dyn TransactionEmbeddingRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub queue: Arc<dyn JobQueue>,
    pub provider: Arc<dyn BankProviderClient>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub enricher: Arc<dyn EnrichmentBackend>,
    /// Sync stages refuse to touch live providers outside production.
    pub environment: ExecutionEnvironment,
}
