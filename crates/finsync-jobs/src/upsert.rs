//! Transaction upsert stage.
//!
//! Writes provider transactions through the duplicate-ignore bulk
//! upsert and routes only the genuinely new rows downstream: an embed
//! job per upsert, and one deferred notification per tenant. Nothing
//! downstream ever sees a duplicate.

use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use finsync_core::{
    defaults, JobType, NewTransaction, Result, TransactionEmbedPayload, TransactionNotifyPayload,
};

use crate::context::SyncContext;

/// Persists fetched transactions and fans out follow-up jobs for the
/// newly inserted ones.
pub struct UpsertStage {
    ctx: SyncContext,
}

impl UpsertStage {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// Upsert `rows` and enqueue downstream work for the new ids.
    /// Returns how many rows were actually inserted.
    pub async fn run(
        &self,
        tenant_id: Uuid,
        rows: Vec<NewTransaction>,
        manual_sync: bool,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let fetched = rows.len();
        let new_ids = self.ctx.transactions.upsert_batch(&rows).await?;

        if new_ids.is_empty() {
            debug!(
                tenant_id = %tenant_id,
                fetched_count = fetched,
                "All fetched transactions already known"
            );
            return Ok(0);
        }

        info!(
            tenant_id = %tenant_id,
            fetched_count = fetched,
            inserted_count = new_ids.len(),
            "Inserted new transactions"
        );

        let embed = TransactionEmbedPayload {
            tenant_id,
            transaction_ids: new_ids.clone(),
        };
        self.ctx
            .queue
            .enqueue(
                JobType::TransactionEmbed,
                Some(serde_json::to_value(&embed)?),
                0,
                None,
            )
            .await?;

        // Manual syncs insert rows pre-notified, so no notification job.
        // The delay batches rapid successive syncs into one ping; the
        // dedup collapses concurrent account workers of the same tenant.
        if !manual_sync {
            let notify = TransactionNotifyPayload { tenant_id };
            self.ctx
                .queue
                .enqueue_deduplicated(
                    tenant_id,
                    JobType::TransactionNotify,
                    Some(serde_json::to_value(&notify)?),
                    0,
                    Some(Duration::from_secs(defaults::NOTIFICATION_DELAY_SECS)),
                )
                .await?;
        }

        Ok(new_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use chrono::{NaiveDate, Utc};
    use finsync_core::{BankProvider, JobStatus, TransactionStatus};

    fn row(tenant_id: Uuid, key: &str) -> NewTransaction {
        NewTransaction {
            account_id: Uuid::new_v4(),
            tenant_id,
            dedup_key: format!("plaid:acc_1:{}", key),
            amount: -4.2,
            currency: "EUR".into(),
            date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            name: "CAFE".into(),
            status: TransactionStatus::Posted,
            category: None,
            counterparty_name: None,
            notified: false,
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let harness = TestHarness::new();
        let stage = UpsertStage::new(harness.ctx.clone());
        let inserted = stage.run(Uuid::new_v4(), vec![], false).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(harness.queue.total_enqueued().await, 0);
    }

    #[tokio::test]
    async fn test_new_rows_enqueue_embed_and_notify() {
        let harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        let inserted = stage
            .run(tenant_id, vec![row(tenant_id, "t1"), row(tenant_id, "t2")], false)
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let embed_jobs = harness.queue.jobs_of_type(JobType::TransactionEmbed).await;
        assert_eq!(embed_jobs.len(), 1);
        let payload: TransactionEmbedPayload =
            serde_json::from_value(embed_jobs[0].payload.clone().unwrap()).unwrap();
        assert_eq!(payload.transaction_ids.len(), 2);

        let notify_jobs = harness.queue.jobs_of_type(JobType::TransactionNotify).await;
        assert_eq!(notify_jobs.len(), 1);
        let delay = (notify_jobs[0].visible_after - Utc::now()).num_seconds();
        assert!((295..=300).contains(&delay), "delay {}", delay);
    }

    #[tokio::test]
    async fn test_duplicates_produce_no_downstream_jobs() {
        let harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        stage
            .run(tenant_id, vec![row(tenant_id, "t1")], false)
            .await
            .unwrap();
        let enqueued_after_first = harness.queue.total_enqueued().await;

        let inserted = stage
            .run(tenant_id, vec![row(tenant_id, "t1")], false)
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(harness.queue.total_enqueued().await, enqueued_after_first);
    }

    #[tokio::test]
    async fn test_partial_overlap_routes_only_new_ids() {
        let harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        stage
            .run(tenant_id, vec![row(tenant_id, "t1")], false)
            .await
            .unwrap();
        let inserted = stage
            .run(
                tenant_id,
                vec![row(tenant_id, "t1"), row(tenant_id, "t2")],
                false,
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let embed_jobs = harness.queue.jobs_of_type(JobType::TransactionEmbed).await;
        assert_eq!(embed_jobs.len(), 2);
        let second: TransactionEmbedPayload =
            serde_json::from_value(embed_jobs[1].payload.clone().unwrap()).unwrap();
        assert_eq!(second.transaction_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_sync_skips_notification() {
        let harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        stage
            .run(tenant_id, vec![row(tenant_id, "t1")], true)
            .await
            .unwrap();

        assert_eq!(
            harness.queue.jobs_of_type(JobType::TransactionEmbed).await.len(),
            1
        );
        assert!(harness
            .queue
            .jobs_of_type(JobType::TransactionNotify)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_notification_deduplicated_per_tenant() {
        let harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        stage
            .run(tenant_id, vec![row(tenant_id, "t1")], false)
            .await
            .unwrap();
        stage
            .run(tenant_id, vec![row(tenant_id, "t2")], false)
            .await
            .unwrap();

        let notify_jobs = harness.queue.jobs_of_type(JobType::TransactionNotify).await;
        assert_eq!(notify_jobs.len(), 1, "pending notification deduplicated");
        assert_eq!(notify_jobs[0].status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_other_tenant_notification_not_deduplicated() {
        let harness = TestHarness::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let stage = UpsertStage::new(harness.ctx.clone());

        stage.run(tenant_a, vec![row(tenant_a, "t1")], false).await.unwrap();
        stage.run(tenant_b, vec![row(tenant_b, "t2")], false).await.unwrap();

        let notify_jobs = harness.queue.jobs_of_type(JobType::TransactionNotify).await;
        assert_eq!(notify_jobs.len(), 2);
    }

    #[test]
    fn test_row_key_shape_matches_transform() {
        let tenant_id = Uuid::new_v4();
        let r = row(tenant_id, "t9");
        assert_eq!(
            r.dedup_key,
            finsync_core::transform::dedup_key(BankProvider::Plaid, "acc_1", "t9")
        );
    }
}
