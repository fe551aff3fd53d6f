//! Per-tenant schedule registration and the daily tenant fan-out stage.
//!
//! Registration is idempotent: the dedup key `{tenant_id}-bank-sync` is
//! unique in storage, so racing registrations collapse to one row. The
//! cron time-of-day is derived deterministically from the tenant id so
//! tenants spread across the day instead of syncing in one thundering
//! herd.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use finsync_core::{
    cron, defaults, ConnectionSyncPayload, JobType, NewScheduleRegistration, Result,
    ScheduleRepository, TenantSyncPayload,
};

use crate::context::SyncContext;
use crate::handler::{JobContext, JobHandler, JobResult};

/// Registers and removes recurring bank-sync schedules for tenants.
pub struct SchedulerRegistrar {
    schedules: Arc<dyn ScheduleRepository>,
}

impl SchedulerRegistrar {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    /// Deterministic dedup key for a tenant's bank-sync registration.
    pub fn dedup_key(tenant_id: Uuid) -> String {
        format!("{}-{}", tenant_id, defaults::BANK_SYNC_TASK)
    }

    /// Ensure the tenant has exactly one daily bank-sync registration.
    /// Returns `true` when a new registration was created.
    #[instrument(skip(self), fields(subsystem = "scheduler"))]
    pub async fn ensure_tenant_schedule(&self, tenant_id: Uuid) -> Result<bool> {
        let tag = cron::daily_tag(&tenant_id.to_string());
        let registration = NewScheduleRegistration {
            tenant_id,
            dedup_key: Self::dedup_key(tenant_id),
            task: defaults::BANK_SYNC_TASK.to_string(),
            cron: tag.daily_expression(),
            timezone: defaults::SCHEDULE_TIMEZONE.to_string(),
        };

        let created = self.schedules.ensure(registration).await?;
        if created {
            info!(
                tenant_id = %tenant_id,
                cron = %tag.daily_expression(),
                "Registered daily bank sync schedule"
            );
        }
        Ok(created)
    }

    /// Remove the tenant's bank-sync registration. Absent is success.
    #[instrument(skip(self), fields(subsystem = "scheduler"))]
    pub async fn remove_tenant_schedule(&self, tenant_id: Uuid) -> Result<()> {
        self.schedules.remove(&Self::dedup_key(tenant_id)).await?;
        info!(tenant_id = %tenant_id, "Removed bank sync schedule");
        Ok(())
    }
}

/// Daily fan-out: enqueue one connection sync per bank connection owned
/// by the tenant.
pub struct TenantSyncHandler {
    ctx: SyncContext,
}

impl TenantSyncHandler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    async fn run(&self, job: &JobContext) -> Result<usize> {
        let payload: TenantSyncPayload = job.payload_as()?;
        let connections = self
            .ctx
            .connections
            .list_for_tenant(payload.tenant_id)
            .await?;

        for connection in &connections {
            let child = ConnectionSyncPayload {
                connection_id: connection.id,
                tenant_id: Some(payload.tenant_id),
                manual_sync: false,
            };
            self.ctx
                .queue
                .enqueue(
                    JobType::ConnectionSync,
                    Some(serde_json::to_value(&child)?),
                    0,
                    None,
                )
                .await?;
        }

        info!(
            tenant_id = %payload.tenant_id,
            connection_count = connections.len(),
            "Tenant sync fan-out complete"
        );
        Ok(connections.len())
    }
}

#[async_trait]
impl JobHandler for TenantSyncHandler {
    fn job_type(&self) -> JobType {
        JobType::TenantSync
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.run(&ctx).await {
            Ok(_) => JobResult::Success,
            Err(e) => {
                warn!(error = %e, "Tenant sync failed");
                JobResult::from_error(e)
            }
        }
    }
}
