//! In-memory fakes and a harness for pipeline handler tests.
//!
//! [`MemoryStore`] backs every repository trait with hash maps and
//! [`MemoryJobQueue`] mimics the durable queue including deferred
//! visibility, retry bookkeeping, and per-tenant dedup, so handler
//! tests exercise the real orchestration logic without Postgres.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use finsync_core::{
    defaults, new_v7, AccountDetails, AccountRepository, AccountSyncPayload, AccountType,
    BankAccount, BankConnection, BankProvider, ConnectionRepository, ConnectionStatus, Error,
    ExecutionEnvironment, Job, JobQueue, JobStatus, JobType, NewScheduleRegistration,
    NewTransaction, NewTransactionEmbedding, ProviderBalance, Result, ScheduleRegistration,
    ScheduleRepository, Transaction, TransactionEmbeddingRepository, TransactionRepository,
    TransactionStatus,
};
use finsync_inference::{MockEmbedder, MockEnricher};
use finsync_providers::MockBankProvider;

use crate::context::SyncContext;

#[derive(Default)]
struct StoreState {
    connections: HashMap<Uuid, BankConnection>,
    accounts: HashMap<Uuid, BankAccount>,
    transactions: HashMap<Uuid, Transaction>,
    dedup_index: HashMap<String, Uuid>,
    embeddings: HashMap<Uuid, (Uuid, String)>,
    schedules: HashMap<String, ScheduleRegistration>,
    status_log: Vec<(Uuid, ConnectionStatus)>,
}

/// In-memory implementation of every storage repository trait.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connection(&self, connection: BankConnection) {
        self.state
            .lock()
            .unwrap()
            .connections
            .insert(connection.id, connection);
    }

    pub fn insert_account(&self, account: BankAccount) {
        self.state.lock().unwrap().accounts.insert(account.id, account);
    }

    pub fn set_error_retries(&self, account_id: Uuid, retries: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.error_retries = retries;
            account.error_details = (retries > 0).then(|| "seeded error".to_string());
        }
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    /// Every status written for a connection, in write order.
    pub async fn connection_status_log(&self, connection_id: Uuid) -> Vec<ConnectionStatus> {
        self.state
            .lock()
            .unwrap()
            .status_log
            .iter()
            .filter(|(id, _)| *id == connection_id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub async fn unnotified_count(&self, tenant_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id && !t.notified)
            .count()
    }
}

#[async_trait]
impl ConnectionRepository for MemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<BankConnection> {
        self.state
            .lock()
            .unwrap()
            .connections
            .get(&id)
            .cloned()
            .ok_or(Error::ConnectionNotFound(id))
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<BankConnection>> {
        let mut out: Vec<BankConnection> = self
            .state
            .lock()
            .unwrap()
            .connections
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.reference_id.clone());
        Ok(out)
    }

    async fn mark_connected(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let connection = state
            .connections
            .get_mut(&id)
            .ok_or(Error::ConnectionNotFound(id))?;
        connection.status = ConnectionStatus::Connected;
        connection.last_accessed = Some(Utc::now());
        state.status_log.push((id, ConnectionStatus::Connected));
        Ok(())
    }

    async fn mark_disconnected(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let connection = state
            .connections
            .get_mut(&id)
            .ok_or(Error::ConnectionNotFound(id))?;
        connection.status = ConnectionStatus::Disconnected;
        state.status_log.push((id, ConnectionStatus::Disconnected));
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<BankAccount> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(Error::AccountNotFound(id))
    }

    async fn list_syncable(
        &self,
        connection_id: Uuid,
        include_quarantined: bool,
    ) -> Result<Vec<BankAccount>> {
        let mut out: Vec<BankAccount> = self
            .state
            .lock()
            .unwrap()
            .accounts
            .values()
            .filter(|a| {
                a.connection_id == connection_id
                    && a.enabled
                    && !a.manual
                    && (include_quarantined || a.error_retries < defaults::QUARANTINE_THRESHOLD)
            })
            .cloned()
            .collect();
        out.sort_by_key(|a| a.external_id.clone());
        Ok(out)
    }

    async fn list_background(&self, connection_id: Uuid) -> Result<Vec<BankAccount>> {
        let mut out: Vec<BankAccount> = self
            .state
            .lock()
            .unwrap()
            .accounts
            .values()
            .filter(|a| a.connection_id == connection_id && a.enabled && !a.manual)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.external_id.clone());
        Ok(out)
    }

    async fn update_balance(&self, id: Uuid, balance: ProviderBalance) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(&id).ok_or(Error::AccountNotFound(id))?;
        account.balance = Some(balance.amount);
        account.available_balance = balance.available;
        account.credit_limit = balance.credit_limit;
        Ok(())
    }

    async fn clear_error(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(&id).ok_or(Error::AccountNotFound(id))?;
        account.error_retries = 0;
        account.error_details = None;
        Ok(())
    }

    async fn record_error(&self, id: Uuid, detail: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.get_mut(&id).ok_or(Error::AccountNotFound(id))?;
        account.error_retries += 1;
        account.error_details = Some(detail.to_string());
        Ok(())
    }

    async fn backfill_details(&self, connection_id: Uuid, details: &AccountDetails) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for account in state.accounts.values_mut() {
            if account.connection_id != connection_id || account.external_id != details.external_id
            {
                continue;
            }
            if account.iban.is_none() {
                account.iban = details.iban.clone();
            }
            if account.routing_number.is_none() {
                account.routing_number = details.routing_number.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn upsert_batch(&self, rows: &[NewTransaction]) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().unwrap();
        let mut new_ids = Vec::new();
        for row in rows {
            if state.dedup_index.contains_key(&row.dedup_key) {
                continue;
            }
            let id = new_v7();
            state.dedup_index.insert(row.dedup_key.clone(), id);
            state.transactions.insert(
                id,
                Transaction {
                    id,
                    account_id: row.account_id,
                    tenant_id: row.tenant_id,
                    dedup_key: row.dedup_key.clone(),
                    amount: row.amount,
                    currency: row.currency.clone(),
                    date: row.date,
                    name: row.name.clone(),
                    status: row.status,
                    category: row.category.clone(),
                    counterparty_name: row.counterparty_name.clone(),
                    notified: row.notified,
                    created_at: Utc::now(),
                },
            );
            new_ids.push(id);
        }
        Ok(new_ids)
    }

    async fn fetch_unembedded(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<Transaction> = ids
            .iter()
            .filter(|id| !state.embeddings.contains_key(id))
            .filter_map(|id| state.transactions.get(id).cloned())
            .collect();
        out.sort_by_key(|t| (t.date, t.id));
        Ok(out)
    }

    async fn mark_notified(&self, tenant_id: Uuid) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let mut flipped = 0;
        for tx in state.transactions.values_mut() {
            if tx.tenant_id == tenant_id && !tx.notified {
                tx.notified = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

#[async_trait]
impl TransactionEmbeddingRepository for MemoryStore {
    async fn insert_batch(&self, rows: Vec<NewTransactionEmbedding>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            state
                .embeddings
                .insert(row.transaction_id, (row.tenant_id, row.model));
        }
        Ok(())
    }

    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .embeddings
            .values()
            .filter(|(tid, _)| *tid == tenant_id)
            .count() as i64)
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn ensure(&self, registration: NewScheduleRegistration) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.schedules.contains_key(&registration.dedup_key) {
            return Ok(false);
        }
        state.schedules.insert(
            registration.dedup_key.clone(),
            ScheduleRegistration {
                id: new_v7(),
                tenant_id: registration.tenant_id,
                dedup_key: registration.dedup_key,
                task: registration.task,
                cron: registration.cron,
                timezone: registration.timezone,
                enabled: true,
            },
        );
        Ok(true)
    }

    async fn remove(&self, dedup_key: &str) -> Result<()> {
        self.state.lock().unwrap().schedules.remove(dedup_key);
        Ok(())
    }

    async fn find(&self, dedup_key: &str) -> Result<Option<ScheduleRegistration>> {
        Ok(self.state.lock().unwrap().schedules.get(dedup_key).cloned())
    }

    async fn list_for_task(&self, task: &str) -> Result<Vec<ScheduleRegistration>> {
        let mut out: Vec<ScheduleRegistration> = self
            .state
            .lock()
            .unwrap()
            .schedules
            .values()
            .filter(|s| s.task == task)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.dedup_key.clone());
        Ok(out)
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, Job>,
    order: Vec<Uuid>,
    auto_complete: bool,
}

/// In-memory job queue with deferred visibility and retry semantics.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every enqueued job is immediately marked completed.
    /// Lets orchestrator tests skip the child wait without running a
    /// worker. Scheduled visibility is still recorded for assertions.
    pub async fn auto_complete(&self, on: bool) {
        self.state.lock().unwrap().auto_complete = on;
    }

    /// All jobs of one type, in enqueue order.
    pub async fn jobs_of_type(&self, job_type: JobType) -> Vec<Job> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .filter(|j| j.job_type == job_type)
            .cloned()
            .collect()
    }

    /// Total number of jobs ever enqueued.
    pub async fn total_enqueued(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    fn push(&self, job_type: JobType, payload: Option<JsonValue>, priority: i32, delay: Option<Duration>) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let id = new_v7();
        let now = Utc::now();
        let visible_after = delay
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d)
            .unwrap_or(now);
        let (status, completed_at) = if state.auto_complete {
            (JobStatus::Completed, Some(now))
        } else {
            (JobStatus::Pending, None)
        };
        state.jobs.insert(
            id,
            Job {
                id,
                job_type,
                status,
                priority,
                payload,
                error_message: None,
                retry_count: 0,
                max_retries: defaults::JOB_MAX_RETRIES,
                visible_after,
                created_at: now,
                started_at: None,
                completed_at,
            },
        );
        state.order.push(id);
        id
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Uuid> {
        Ok(self.push(job_type, payload, priority, delay))
    }

    async fn enqueue_deduplicated(
        &self,
        tenant_id: Uuid,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Option<Uuid>> {
        {
            let state = self.state.lock().unwrap();
            let tenant = tenant_id.to_string();
            let duplicate = state.jobs.values().any(|j| {
                j.job_type == job_type
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
                    && j.payload
                        .as_ref()
                        .and_then(|p| p.get("tenant_id"))
                        .and_then(|v| v.as_str())
                        .map(|t| t == tenant)
                        .unwrap_or(false)
            });
            if duplicate {
                return Ok(None);
            }
        }
        Ok(Some(self.push(job_type, payload, priority, delay)))
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut eligible: Vec<(i32, DateTime<Utc>, Uuid)> = state
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.visible_after <= now
                    && job_types.contains(&j.job_type)
            })
            .map(|j| (-j.priority, j.created_at, j.id))
            .collect();
        eligible.sort();
        let Some(&(_, _, id)) = eligible.first() else {
            return Ok(None);
        };
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::Job(format!("job {} not found", id)))?;
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::Job(format!("job {} not found", job_id)))?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::Job(format!("job {} not found", job_id)))?;
        job.error_message = Some(error.to_string());
        if job.retry_count < job.max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Pending;
            job.started_at = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.state.lock().unwrap().jobs.get(&job_id).cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }
}

/// Fully wired in-memory pipeline for handler tests.
pub struct TestHarness {
    pub ctx: SyncContext,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub provider: Arc<MockBankProvider>,
    pub embedder: Arc<MockEmbedder>,
    pub enricher: Arc<MockEnricher>,
    seq: u32,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_environment(ExecutionEnvironment::Production)
    }

    /// Harness outside production, for environment guard tests.
    pub fn development() -> Self {
        Self::with_environment(ExecutionEnvironment::Development)
    }

    fn with_environment(environment: ExecutionEnvironment) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let provider = Arc::new(MockBankProvider::new());
        let embedder = Arc::new(MockEmbedder::new(defaults::EMBED_DIMENSION));
        let enricher = Arc::new(MockEnricher::new());

        let ctx = SyncContext {
            connections: store.clone(),
            accounts: store.clone(),
            transactions: store.clone(),
            embeddings: store.clone(),
            schedules: store.clone(),
            queue: queue.clone(),
            provider: provider.clone(),
            embedder: embedder.clone(),
            enricher: enricher.clone(),
            environment,
        };

        Self {
            ctx,
            store,
            queue,
            provider,
            embedder,
            enricher,
            seq: 0,
        }
    }

    pub fn add_connection(&mut self, tenant_id: Uuid) -> BankConnection {
        self.seq += 1;
        let connection = BankConnection {
            id: Uuid::new_v4(),
            tenant_id,
            provider: BankProvider::Plaid,
            access_token: "access-token".into(),
            reference_id: format!("ref_{}", self.seq),
            status: ConnectionStatus::Connected,
            last_accessed: None,
        };
        self.store.insert_connection(connection.clone());
        connection
    }

    pub fn add_account(&mut self, connection: &BankConnection) -> BankAccount {
        self.add_account_with_balance(connection, None)
    }

    pub fn add_account_with_balance(
        &mut self,
        connection: &BankConnection,
        balance: Option<f64>,
    ) -> BankAccount {
        self.seq += 1;
        let account = BankAccount {
            id: Uuid::new_v4(),
            connection_id: connection.id,
            tenant_id: connection.tenant_id,
            external_id: format!("acc_{}", self.seq),
            account_type: AccountType::Depository,
            balance,
            available_balance: None,
            credit_limit: None,
            currency: Some("EUR".into()),
            enabled: true,
            manual: false,
            error_retries: 0,
            error_details: None,
            iban: None,
            routing_number: None,
        };
        self.store.insert_account(account.clone());
        account
    }

    pub fn set_error_retries(&mut self, account_id: Uuid, retries: i32) {
        self.store.set_error_retries(account_id, retries);
    }

    /// Build a job without enqueuing it, for direct handler invocation.
    pub fn make_job(&self, job_type: JobType, payload: JsonValue) -> Job {
        self.job(job_type, Some(payload))
    }

    pub fn make_job_without_payload(&self, job_type: JobType) -> Job {
        self.job(job_type, None)
    }

    pub fn account_sync_job(
        &self,
        connection: &BankConnection,
        account: &BankAccount,
        manual_sync: bool,
    ) -> Job {
        let payload = AccountSyncPayload {
            connection_id: connection.id,
            account_id: account.id,
            tenant_id: connection.tenant_id,
            provider: connection.provider,
            access_token: connection.access_token.clone(),
            external_id: account.external_id.clone(),
            account_type: account.account_type,
            manual_sync,
        };
        self.job(
            JobType::AccountSync,
            Some(serde_json::to_value(&payload).unwrap()),
        )
    }

    fn job(&self, job_type: JobType, payload: Option<JsonValue>) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Running,
            priority: 0,
            payload,
            error_message: None,
            retry_count: 0,
            max_retries: defaults::JOB_MAX_RETRIES,
            visible_after: now,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    /// Insert `count` un-notified, un-embedded transactions for a tenant.
    pub async fn seed_transactions(&mut self, tenant_id: Uuid, count: usize) -> Vec<Uuid> {
        let account_id = Uuid::new_v4();
        let rows: Vec<NewTransaction> = (0..count)
            .map(|i| {
                self.seq += 1;
                NewTransaction {
                    account_id,
                    tenant_id,
                    dedup_key: format!("plaid:{}:seed_{}", account_id, self.seq),
                    amount: -(i as f64) - 1.0,
                    currency: "EUR".into(),
                    date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                    name: format!("MERCHANT {}", i),
                    status: TransactionStatus::Posted,
                    category: None,
                    counterparty_name: None,
                    notified: false,
                }
            })
            .collect();
        self.store.upsert_batch(&rows).await.unwrap()
    }

    /// Insert one transaction with no embeddable text.
    pub async fn seed_blank_transaction(&mut self, tenant_id: Uuid) -> Uuid {
        self.seq += 1;
        let rows = vec![NewTransaction {
            account_id: Uuid::new_v4(),
            tenant_id,
            dedup_key: format!("plaid:blank:seed_{}", self.seq),
            amount: -1.0,
            currency: "EUR".into(),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            name: "   ".into(),
            status: TransactionStatus::Posted,
            category: None,
            counterparty_name: None,
            notified: false,
        }];
        self.store.upsert_batch(&rows).await.unwrap()[0]
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_queue_visibility_and_claim() {
        let queue = MemoryJobQueue::new();
        let deferred = queue
            .enqueue(JobType::AccountSync, None, 0, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        let immediate = queue
            .enqueue(JobType::AccountSync, None, 0, None)
            .await
            .unwrap();

        let claimed = queue
            .claim_next_for_types(&[JobType::AccountSync])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, immediate);

        // Deferred job is invisible until its delay elapses.
        assert!(queue
            .claim_next_for_types(&[JobType::AccountSync])
            .await
            .unwrap()
            .is_none());
        let job = queue.get(deferred).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_memory_queue_fail_requeues_until_budget() {
        let queue = MemoryJobQueue::new();
        let id = queue.enqueue(JobType::AccountSync, None, 0, None).await.unwrap();

        for expected_retry in 1..=defaults::JOB_MAX_RETRIES {
            queue.fail(id, "transient").await.unwrap();
            let job = queue.get(id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Pending);
            assert_eq!(job.retry_count, expected_retry);
        }

        queue.fail(id, "still broken").await.unwrap();
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("still broken"));
    }

    #[tokio::test]
    async fn test_memory_queue_dedup_ignores_terminal_jobs() {
        let queue = MemoryJobQueue::new();
        let tenant = Uuid::new_v4();
        let payload = serde_json::json!({ "tenant_id": tenant });

        let first = queue
            .enqueue_deduplicated(tenant, JobType::TransactionNotify, Some(payload.clone()), 0, None)
            .await
            .unwrap()
            .unwrap();
        assert!(queue
            .enqueue_deduplicated(tenant, JobType::TransactionNotify, Some(payload.clone()), 0, None)
            .await
            .unwrap()
            .is_none());

        queue.complete(first).await.unwrap();
        assert!(queue
            .enqueue_deduplicated(tenant, JobType::TransactionNotify, Some(payload), 0, None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_store_upsert_ignores_duplicates() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let row = NewTransaction {
            account_id: Uuid::new_v4(),
            tenant_id: tenant,
            dedup_key: "plaid:a:t1".into(),
            amount: -1.0,
            currency: "EUR".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            name: "X".into(),
            status: TransactionStatus::Posted,
            category: None,
            counterparty_name: None,
            notified: false,
        };
        let first = store.upsert_batch(&[row.clone()]).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = store.upsert_batch(&[row]).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.transaction_count().await, 1);
    }
}
