//! Account sync worker.
//!
//! One invocation syncs one bank account in two phases: a balance
//! snapshot, then a transaction fetch feeding the duplicate-ignore
//! upsert stage. The phases are independent; transient trouble in one
//! never blocks the other. Either phase failing with a dead credential
//! charges the account's consecutive-error budget; a clean phase
//! resets it.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use finsync_core::{
    defaults, transform, AccountSyncPayload, Error, JobType, NewTransaction, ProviderErrorKind,
    Result,
};

use crate::context::SyncContext;
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::upsert::UpsertStage;

/// Syncs one bank account: balance, then transactions.
pub struct AccountSyncHandler {
    ctx: SyncContext,
    upsert: UpsertStage,
}

impl AccountSyncHandler {
    pub fn new(ctx: SyncContext) -> Self {
        let upsert = UpsertStage::new(ctx.clone());
        Self { ctx, upsert }
    }

    #[instrument(
        skip(self, job),
        fields(subsystem = "sync", component = "account", op = "execute")
    )]
    async fn run(&self, job: &JobContext) -> Result<()> {
        let payload: AccountSyncPayload = job.payload_as()?;

        self.ctx.environment.require_production()?;

        // Phase one. A persisted balance already proves the credential
        // works and clears the error budget on its own. Only a dead
        // credential stops the cycle here; anything else is logged and
        // the transaction phase still runs.
        match self.sync_balance(&payload).await {
            Ok(true) => self.ctx.accounts.clear_error(payload.account_id).await?,
            Ok(false) => {}
            Err(
                e @ Error::Provider {
                    kind: ProviderErrorKind::Disconnected,
                    ..
                },
            ) => return Err(e),
            Err(e) => warn!(
                account_id = %payload.account_id,
                error = %e,
                "Balance sync failed, continuing with transactions"
            ),
        }

        let inserted = self.sync_transactions(&payload).await?;
        self.ctx.accounts.clear_error(payload.account_id).await?;

        info!(
            account_id = %payload.account_id,
            tenant_id = %payload.tenant_id,
            provider = %payload.provider,
            inserted_count = inserted,
            manual_sync = payload.manual_sync,
            "Account sync complete"
        );
        Ok(())
    }

    /// Balance phase. An absent snapshot is a no-op, never an error;
    /// zero and negative balances are real data and get persisted.
    /// Returns whether a snapshot was persisted.
    async fn sync_balance(&self, payload: &AccountSyncPayload) -> Result<bool> {
        let balance = self
            .ctx
            .provider
            .account_balance(
                &payload.external_id,
                payload.provider,
                &payload.access_token,
                payload.account_type,
            )
            .await?;

        match balance {
            Some(balance) => {
                self.ctx
                    .accounts
                    .update_balance(payload.account_id, balance)
                    .await?;
                Ok(true)
            }
            None => {
                debug!(
                    account_id = %payload.account_id,
                    "Provider returned no balance, keeping stored value"
                );
                Ok(false)
            }
        }
    }

    /// Transaction phase. Background syncs fetch the incremental window
    /// only; manual syncs pull all available history and mark the rows
    /// pre-notified so the user is not pinged about history they asked
    /// for.
    async fn sync_transactions(&self, payload: &AccountSyncPayload) -> Result<usize> {
        let latest_only = !payload.manual_sync;
        let raw = self
            .ctx
            .provider
            .transactions(
                &payload.external_id,
                payload.provider,
                &payload.access_token,
                payload.account_type.classification(),
                latest_only,
            )
            .await?;

        if raw.is_empty() {
            return Ok(0);
        }

        let rows: Vec<NewTransaction> = raw
            .iter()
            .map(|tx| {
                transform::transform_transaction(
                    tx,
                    payload.provider,
                    &payload.external_id,
                    payload.account_id,
                    payload.tenant_id,
                    payload.manual_sync,
                )
            })
            .collect();

        // Bounded batches, each waited on before the next is issued.
        let mut inserted = 0;
        for chunk in rows.chunks(defaults::UPSERT_BATCH_SIZE) {
            inserted += self
                .upsert
                .run(payload.tenant_id, chunk.to_vec(), payload.manual_sync)
                .await?;
        }
        Ok(inserted)
    }

    /// Charge the error budget only for dead credentials. Transient
    /// provider trouble and malformed requests say nothing about this
    /// account's health.
    async fn record_failure(&self, job: &JobContext, err: &Error) {
        let disconnected = matches!(
            err,
            Error::Provider {
                kind: ProviderErrorKind::Disconnected,
                ..
            }
        );
        if !disconnected {
            return;
        }
        if let Ok(payload) = job.payload_as::<AccountSyncPayload>() {
            if let Err(e) = self
                .ctx
                .accounts
                .record_error(payload.account_id, &err.to_string())
                .await
            {
                warn!(
                    account_id = %payload.account_id,
                    error = %e,
                    "Failed to record account sync error"
                );
            }
        }
    }
}

#[async_trait]
impl JobHandler for AccountSyncHandler {
    fn job_type(&self) -> JobType {
        JobType::AccountSync
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.run(&ctx).await {
            Ok(()) => JobResult::Success,
            Err(e) => {
                warn!(error = %e, "Account sync failed");
                self.record_failure(&ctx, &e).await;
                JobResult::from_error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use chrono::NaiveDate;
    use finsync_core::{ProviderBalance, RawTransaction, TransactionStatus};
    use uuid::Uuid;

    fn raw_tx(id: &str, amount: f64) -> RawTransaction {
        RawTransaction {
            id: id.to_string(),
            amount,
            currency: "eur".into(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            name: "ACME GMBH".into(),
            status: TransactionStatus::Posted,
            category: None,
            counterparty_name: Some("Acme".into()),
        }
    }

    #[tokio::test]
    async fn test_balance_and_transactions_persisted() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness.provider.with_balance(
            &account.external_id,
            Some(ProviderBalance {
                amount: 1204.55,
                available: Some(1100.0),
                credit_limit: None,
            }),
        );
        harness
            .provider
            .with_transactions(&account.external_id, vec![raw_tx("t1", -9.5), raw_tx("t2", 25.0)]);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.balance, Some(1204.55));
        assert_eq!(stored.available_balance, Some(1100.0));
        assert_eq!(harness.store.transaction_count().await, 2);
    }

    #[tokio::test]
    async fn test_absent_balance_keeps_stored_value() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account_with_balance(&connection, Some(500.0));

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.balance, Some(500.0));
    }

    #[tokio::test]
    async fn test_zero_balance_is_real_data() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account_with_balance(&connection, Some(500.0));
        harness.provider.with_balance(
            &account.external_id,
            Some(ProviderBalance {
                amount: 0.0,
                available: None,
                credit_limit: None,
            }),
        );

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        handler.execute(JobContext::new(job)).await;

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.balance, Some(0.0));
    }

    #[tokio::test]
    async fn test_success_resets_error_counter() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness.set_error_retries(account.id, 2);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.error_retries, 0);
        assert!(stored.error_details.is_none());
    }

    #[tokio::test]
    async fn test_disconnected_failure_charges_error_budget() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness
            .provider
            .with_failure(&account.external_id, ProviderErrorKind::Disconnected);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Failed(_)));

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.error_retries, 1);
        assert!(stored.error_details.is_some());
    }

    #[tokio::test]
    async fn test_rate_limit_retries_without_charging_budget() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness
            .provider
            .with_failure(&account.external_id, ProviderErrorKind::RateLimited);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Retry(_)));

        // The balance failure did not short-circuit the transaction fetch.
        assert_eq!(harness.provider.call_count("transactions"), 1);
        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.error_retries, 0);
    }

    #[tokio::test]
    async fn test_transient_balance_failure_still_syncs_transactions() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness.provider.with_operation_failure(
            &account.external_id,
            "account_balance",
            ProviderErrorKind::Unavailable,
        );
        harness
            .provider
            .with_transactions(&account.external_id, vec![raw_tx("t1", -9.5)]);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));

        assert_eq!(harness.store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_persisted_balance_clears_budget_even_when_transactions_fail() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness.set_error_retries(account.id, 2);
        harness.provider.with_balance(
            &account.external_id,
            Some(ProviderBalance {
                amount: 77.0,
                available: None,
                credit_limit: None,
            }),
        );
        harness.provider.with_operation_failure(
            &account.external_id,
            "transactions",
            ProviderErrorKind::Unavailable,
        );

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Retry(_)));

        let stored = harness.ctx.accounts.fetch(account.id).await.unwrap();
        assert_eq!(stored.balance, Some(77.0));
        assert_eq!(stored.error_retries, 0, "good balance resets the budget");
    }

    #[tokio::test]
    async fn test_manual_sync_fetches_full_history() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, true);
        handler.execute(JobContext::new(job)).await;

        let calls: Vec<_> = harness
            .provider
            .calls()
            .into_iter()
            .filter(|c| c.operation == "transactions")
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].latest_only, Some(false), "manual sync pulls full history");
    }

    #[tokio::test]
    async fn test_background_sync_fetches_latest_only() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        handler.execute(JobContext::new(job)).await;

        let calls: Vec<_> = harness
            .provider
            .calls()
            .into_iter()
            .filter(|c| c.operation == "transactions")
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].latest_only, Some(true));
    }

    #[tokio::test]
    async fn test_large_history_upserts_in_bounded_batches() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        let txs: Vec<RawTransaction> = (0..600)
            .map(|i| raw_tx(&format!("t{}", i), -1.0))
            .collect();
        harness.provider.with_transactions(&account.external_id, txs);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, true);
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));

        assert_eq!(harness.store.transaction_count().await, 600);
        // 600 rows at a batch cap of 500: two upsert batches, two embed
        // jobs.
        let embed_jobs = harness.queue.jobs_of_type(JobType::TransactionEmbed).await;
        assert_eq!(embed_jobs.len(), 2);
    }

    #[tokio::test]
    async fn test_resync_inserts_nothing_new() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let connection = harness.add_connection(tenant_id);
        let account = harness.add_account(&connection);
        harness
            .provider
            .with_transactions(&account.external_id, vec![raw_tx("t1", -9.5)]);

        let handler = AccountSyncHandler::new(harness.ctx.clone());
        let job = harness.account_sync_job(&connection, &account, false);
        handler.execute(JobContext::new(job)).await;
        let job = harness.account_sync_job(&connection, &account, false);
        handler.execute(JobContext::new(job)).await;

        assert_eq!(harness.store.transaction_count().await, 1);
        // Only the first cycle produced an embed job.
        let embed_jobs = harness.queue.jobs_of_type(JobType::TransactionEmbed).await;
        assert_eq!(embed_jobs.len(), 1);
    }
}
