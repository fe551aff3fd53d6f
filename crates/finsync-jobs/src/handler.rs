//! Job handler trait and execution context.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use finsync_core::{Error, Job, JobType, Result};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Get the raw job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Deserialize the payload into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .payload()
            .ok_or_else(|| Error::Job(format!("{:?} job has no payload", self.job.job_type)))?;
        serde_json::from_value(value.clone()).map_err(Into::into)
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully.
    Success,
    /// Job failed. The queue still re-delivers while the retry budget
    /// lasts; a dead credential on the final attempt stays failed.
    Failed(String),
    /// Transient failure; the queue re-delivers while the retry budget
    /// lasts.
    Retry(String),
}

impl JobResult {
    /// Fold a pipeline error into a job result based on its class.
    /// Transient provider failures retry; everything else is terminal.
    pub fn from_error(err: Error) -> Self {
        match &err {
            Error::Provider { kind, .. } => match kind {
                finsync_core::ProviderErrorKind::RateLimited
                | finsync_core::ProviderErrorKind::Unavailable => JobResult::Retry(err.to_string()),
                _ => JobResult::Failed(err.to_string()),
            },
            Error::Database(_) => JobResult::Retry(err.to_string()),
            _ => JobResult::Failed(err.to_string()),
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job type.
    fn can_handle(&self, job_type: JobType) -> bool {
        self.job_type() == job_type
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    job_type: JobType,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given job type.
    pub fn new(job_type: JobType) -> Self {
        Self { job_type }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use finsync_core::{JobStatus, TenantSyncPayload};
    use uuid::Uuid;

    fn job_with_payload(payload: Option<JsonValue>) -> Job {
        Job {
            id: Uuid::new_v4(),
            job_type: JobType::TenantSync,
            status: JobStatus::Pending,
            priority: 0,
            payload,
            error_message: None,
            retry_count: 0,
            max_retries: 2,
            visible_after: Utc::now(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_payload_as_typed() {
        let tenant_id = Uuid::new_v4();
        let job = job_with_payload(Some(serde_json::json!({ "tenant_id": tenant_id })));
        let ctx = JobContext::new(job);
        let payload: TenantSyncPayload = ctx.payload_as().unwrap();
        assert_eq!(payload.tenant_id, tenant_id);
    }

    #[test]
    fn test_payload_as_missing_payload() {
        let ctx = JobContext::new(job_with_payload(None));
        assert!(ctx.payload_as::<TenantSyncPayload>().is_err());
    }

    #[test]
    fn test_from_error_transient_provider_retries() {
        use finsync_core::ProviderErrorKind;
        let result =
            JobResult::from_error(Error::provider(ProviderErrorKind::RateLimited, "slow down"));
        assert!(matches!(result, JobResult::Retry(_)));

        let result =
            JobResult::from_error(Error::provider(ProviderErrorKind::Unavailable, "down"));
        assert!(matches!(result, JobResult::Retry(_)));
    }

    #[test]
    fn test_from_error_disconnected_is_terminal() {
        use finsync_core::ProviderErrorKind;
        let result =
            JobResult::from_error(Error::provider(ProviderErrorKind::Disconnected, "expired"));
        assert!(matches!(result, JobResult::Failed(_)));
    }

    #[test]
    fn test_from_error_config_is_terminal() {
        let result = JobResult::from_error(Error::Config("missing tenant id".into()));
        assert!(matches!(result, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler::new(JobType::TenantSync);
        assert_eq!(handler.job_type(), JobType::TenantSync);
        assert!(handler.can_handle(JobType::TenantSync));
        assert!(!handler.can_handle(JobType::AccountSync));

        let result = handler.execute(JobContext::new(job_with_payload(None))).await;
        assert!(matches!(result, JobResult::Success));
    }
}
