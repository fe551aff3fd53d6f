//! Deferred new-transactions notification stage.
//!
//! By the time this job becomes visible the notification delay has
//! already batched any rapid successive syncs for the tenant. The
//! actual delivery channel hangs off the flipped rows downstream; this
//! stage owns the bookkeeping.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use finsync_core::{JobType, Result, TransactionNotifyPayload};

use crate::context::SyncContext;
use crate::handler::{JobContext, JobHandler, JobResult};

/// Flips a tenant's un-notified transactions to notified.
pub struct TransactionNotifyHandler {
    ctx: SyncContext,
}

impl TransactionNotifyHandler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    #[instrument(
        skip(self, job),
        fields(subsystem = "pipeline", component = "notify", op = "execute")
    )]
    async fn run(&self, job: &JobContext) -> Result<()> {
        let payload: TransactionNotifyPayload = job.payload_as()?;
        let flipped = self.ctx.transactions.mark_notified(payload.tenant_id).await?;

        if flipped == 0 {
            debug!(tenant_id = %payload.tenant_id, "No transactions awaiting notification");
        } else {
            info!(
                tenant_id = %payload.tenant_id,
                count = flipped,
                "Notified tenant of new transactions"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for TransactionNotifyHandler {
    fn job_type(&self) -> JobType {
        JobType::TransactionNotify
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.run(&ctx).await {
            Ok(()) => JobResult::Success,
            Err(e) => {
                warn!(error = %e, "Transaction notification failed");
                JobResult::from_error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_marks_tenant_transactions_notified() {
        let mut harness = TestHarness::new();
        let tenant_id = Uuid::new_v4();
        harness.seed_transactions(tenant_id, 3).await;

        let handler = TransactionNotifyHandler::new(harness.ctx.clone());
        let job = harness.make_job(
            JobType::TransactionNotify,
            serde_json::json!({ "tenant_id": tenant_id }),
        );
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));
        assert_eq!(harness.store.unnotified_count(tenant_id).await, 0);
    }

    #[tokio::test]
    async fn test_other_tenants_untouched() {
        let mut harness = TestHarness::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        harness.seed_transactions(tenant_a, 2).await;
        harness.seed_transactions(tenant_b, 2).await;

        let handler = TransactionNotifyHandler::new(harness.ctx.clone());
        let job = harness.make_job(
            JobType::TransactionNotify,
            serde_json::json!({ "tenant_id": tenant_a }),
        );
        handler.execute(JobContext::new(job)).await;

        assert_eq!(harness.store.unnotified_count(tenant_a).await, 0);
        assert_eq!(harness.store.unnotified_count(tenant_b).await, 2);
    }

    #[tokio::test]
    async fn test_nothing_pending_is_success() {
        let harness = TestHarness::new();
        let handler = TransactionNotifyHandler::new(harness.ctx.clone());
        let job = harness.make_job(
            JobType::TransactionNotify,
            serde_json::json!({ "tenant_id": Uuid::new_v4() }),
        );
        let result = handler.execute(JobContext::new(job)).await;
        assert!(matches!(result, JobResult::Success));
    }
}
