//! Connection sync orchestrator.
//!
//! One invocation syncs one bank connection: guard the environment,
//! probe the live provider status, fan out one staggered account sync
//! job per eligible account, wait for the children, then run the
//! connection-level health check. The orchestrator is the only writer
//! of connection status.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use finsync_core::{
    defaults, AccountSyncPayload, BankConnection, ConnectionStatus, ConnectionSyncPayload, Error,
    JobStatus, JobType, Result,
};

use crate::context::SyncContext;
use crate::handler::{JobContext, JobHandler, JobResult};

/// Orchestrates a full sync cycle for one bank connection.
pub struct ConnectionSyncHandler {
    ctx: SyncContext,
}

impl ConnectionSyncHandler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    #[instrument(
        skip(self, job),
        fields(subsystem = "sync", component = "connection", op = "execute")
    )]
    async fn run(&self, job: &JobContext) -> Result<()> {
        let payload: ConnectionSyncPayload = job.payload_as()?;

        // A payload without a tenant is a configuration error, never a
        // silent skip.
        let tenant_id = payload
            .tenant_id
            .ok_or_else(|| Error::Config("connection sync payload is missing tenant_id".into()))?;

        self.ctx.environment.require_production()?;

        let connection = self.ctx.connections.fetch(payload.connection_id).await?;

        // Probe the live status before touching any account.
        let status = match self.probe(&connection).await? {
            Some(status) => status,
            None => {
                // Probe said the credential is dead. Disconnect and stop;
                // no account work makes sense without access.
                self.ctx.connections.mark_disconnected(connection.id).await?;
                info!(
                    connection_id = %connection.id,
                    tenant_id = %tenant_id,
                    provider = %connection.provider,
                    "Connection disconnected by status probe"
                );
                return Ok(());
            }
        };

        if status == ConnectionStatus::Disconnected {
            self.ctx.connections.mark_disconnected(connection.id).await?;
            info!(
                connection_id = %connection.id,
                tenant_id = %tenant_id,
                "Provider reports connection disconnected"
            );
            return Ok(());
        }

        // The probe succeeded, so restored credentials show up now
        // instead of after the multi-minute fan-out. The post-fan-out
        // health check below still has the last word.
        self.ctx.connections.mark_connected(connection.id).await?;

        let accounts = self
            .ctx
            .accounts
            .list_syncable(connection.id, payload.manual_sync)
            .await?;

        info!(
            connection_id = %connection.id,
            tenant_id = %tenant_id,
            account_count = accounts.len(),
            manual_sync = payload.manual_sync,
            "Fanning out account syncs"
        );

        let stagger = if payload.manual_sync {
            defaults::MANUAL_SYNC_STAGGER_SECS
        } else {
            defaults::BACKGROUND_SYNC_STAGGER_SECS
        };

        let mut child_ids = Vec::with_capacity(accounts.len());
        for (i, account) in accounts.iter().enumerate() {
            let child = AccountSyncPayload {
                connection_id: connection.id,
                account_id: account.id,
                tenant_id,
                provider: connection.provider,
                access_token: connection.access_token.clone(),
                external_id: account.external_id.clone(),
                account_type: account.account_type,
                manual_sync: payload.manual_sync,
            };
            let delay = Duration::from_secs(stagger * i as u64);
            let id = self
                .ctx
                .queue
                .enqueue(
                    JobType::AccountSync,
                    Some(serde_json::to_value(&child)?),
                    0,
                    Some(delay),
                )
                .await?;
            child_ids.push(id);
        }

        self.wait_for_children(&child_ids, stagger).await;

        // Health check runs over every enabled background account, not
        // just the ones this cycle touched. Quarantined accounts still
        // count; their stale errors are exactly the signal.
        let background = self.ctx.accounts.list_background(connection.id).await?;
        let all_failing = !background.is_empty()
            && background
                .iter()
                .all(|a| a.error_retries >= defaults::ESCALATION_THRESHOLD);

        if all_failing {
            self.ctx.connections.mark_disconnected(connection.id).await?;
            warn!(
                connection_id = %connection.id,
                tenant_id = %tenant_id,
                account_count = background.len(),
                "Every account is failing, disconnecting connection"
            );
        } else {
            self.ctx.connections.mark_connected(connection.id).await?;
        }

        Ok(())
    }

    /// Probe the provider. `Ok(None)` means the credential itself is dead
    /// (provider-side disconnect); transient errors propagate for retry.
    async fn probe(&self, connection: &BankConnection) -> Result<Option<ConnectionStatus>> {
        match self
            .ctx
            .provider
            .connection_status(
                &connection.reference_id,
                connection.provider,
                &connection.access_token,
            )
            .await
        {
            Ok(probe) => {
                // Best-effort backfill of static details surfaced by the
                // probe. Failure never aborts the sync.
                for details in &probe.account_details {
                    if let Err(e) = self.ctx.accounts.backfill_details(connection.id, details).await
                    {
                        debug!(
                            connection_id = %connection.id,
                            error = %e,
                            "Account detail backfill failed"
                        );
                    }
                }
                Ok(Some(probe.status))
            }
            Err(e) if e.is_disconnected() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll the queue until every child reaches a terminal status or the
    /// wait budget runs out. Children past the budget are left to finish
    /// on their own; the health check below still reflects them next
    /// cycle.
    async fn wait_for_children(&self, child_ids: &[Uuid], stagger_secs: u64) {
        if child_ids.is_empty() {
            return;
        }

        let budget = child_wait_budget(child_ids.len(), stagger_secs);
        let deadline = Utc::now() + chrono::Duration::from_std(budget).unwrap_or_default();
        let poll = Duration::from_millis(defaults::CHILD_POLL_INTERVAL_MS);

        loop {
            let mut pending = 0usize;
            for id in child_ids {
                match self.ctx.queue.get(*id).await {
                    Ok(Some(job)) => match job.status {
                        JobStatus::Pending | JobStatus::Running => pending += 1,
                        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {}
                    },
                    Ok(None) => {}
                    Err(e) => {
                        debug!(job_id = %id, error = %e, "Child status poll failed");
                        pending += 1;
                    }
                }
            }

            if pending == 0 {
                return;
            }
            if Utc::now() >= deadline {
                warn!(
                    pending,
                    total = child_ids.len(),
                    "Gave up waiting on account sync children"
                );
                return;
            }
            sleep(poll).await;
        }
    }
}

/// Budget for waiting on a fan-out: the stagger span (the last child
/// only becomes visible after it) plus one account sync budget, capped
/// so the orchestrator's own invocation timeout never fires mid-wait.
/// A wide fan-out can exceed the cap; leftover children finish on
/// their own and the next cycle picks up their state.
fn child_wait_budget(child_count: usize, stagger_secs: u64) -> Duration {
    let span = stagger_secs * (child_count as u64 - 1);
    let cap = defaults::CONNECTION_SYNC_TIMEOUT_SECS - defaults::CHILD_WAIT_MARGIN_SECS;
    Duration::from_secs((span + defaults::ACCOUNT_SYNC_TIMEOUT_SECS).min(cap))
}

#[async_trait]
impl JobHandler for ConnectionSyncHandler {
    fn job_type(&self) -> JobType {
        JobType::ConnectionSync
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.run(&ctx).await {
            Ok(()) => JobResult::Success,
            Err(e) => {
                warn!(error = %e, "Connection sync failed");
                JobResult::from_error(e)
            }
        }
    }
}
