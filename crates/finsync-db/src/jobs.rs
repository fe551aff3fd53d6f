//! Job queue repository implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use finsync_core::{defaults, new_v7, Error, Job, JobQueue, JobStatus, JobType, Result};

/// PostgreSQL implementation of JobQueue.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgJobQueue {
    /// Create a new PgJobQueue with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Convert JobType to string for database.
    fn job_type_to_str(job_type: JobType) -> &'static str {
        match job_type {
            JobType::TenantSync => "tenant_sync",
            JobType::ConnectionSync => "connection_sync",
            JobType::AccountSync => "account_sync",
            JobType::TransactionEmbed => "transaction_embed",
            JobType::TransactionNotify => "transaction_notify",
        }
    }

    /// Convert string from database to JobType.
    fn str_to_job_type(s: &str) -> JobType {
        match s {
            "tenant_sync" => JobType::TenantSync,
            "connection_sync" => JobType::ConnectionSync,
            "account_sync" => JobType::AccountSync,
            "transaction_embed" => JobType::TransactionEmbed,
            "transaction_notify" => JobType::TransactionNotify,
            _ => JobType::ConnectionSync, // fallback
        }
    }

    /// Convert string from database to JobStatus.
    fn str_to_job_status(s: &str) -> JobStatus {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending, // fallback
        }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        Job {
            id: row.get("id"),
            job_type: Self::str_to_job_type(row.get("job_type")),
            status: Self::str_to_job_status(row.get("status")),
            priority: row.get("priority"),
            payload: row.get("payload"),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            visible_after: row.get("visible_after"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }

    const COLUMNS: &'static str = "id, job_type::text, status::text, priority, payload,
                       error_message, retry_count, max_retries, visible_after,
                       created_at, started_at, completed_at";
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();
        let visible_after = match delay {
            Some(d) => now + chrono::Duration::from_std(d).unwrap_or_default(),
            None => now,
        };

        sqlx::query(
            "INSERT INTO job_queue
                 (id, job_type, status, priority, payload, max_retries, visible_after, created_at)
             VALUES ($1, $2::job_type, 'pending'::job_status, $3, $4, $5, $6, $7)",
        )
        .bind(job_id)
        .bind(Self::job_type_to_str(job_type))
        .bind(priority)
        .bind(&payload)
        .bind(defaults::JOB_MAX_RETRIES)
        .bind(visible_after)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    async fn enqueue_deduplicated(
        &self,
        tenant_id: Uuid,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Option<Duration>,
    ) -> Result<Option<Uuid>> {
        let job_id = new_v7();
        let now = Utc::now();
        let visible_after = match delay {
            Some(d) => now + chrono::Duration::from_std(d).unwrap_or_default(),
            None => now,
        };
        let job_type_str = Self::job_type_to_str(job_type);

        // Atomic check-and-insert via INSERT ... WHERE NOT EXISTS to prevent
        // TOCTOU races when concurrent callers queue the same tenant job.
        let result = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO job_queue
                 (id, job_type, status, priority, payload, max_retries, visible_after, created_at)
             SELECT $1, $2::job_type, 'pending'::job_status, $3, $4, $5, $6, $7
             WHERE NOT EXISTS (
                 SELECT 1 FROM job_queue
                 WHERE payload->>'tenant_id' = $8
                   AND job_type = $2::job_type
                   AND status IN ('pending'::job_status, 'running'::job_status)
             )
             RETURNING id",
        )
        .bind(job_id)
        .bind(job_type_str)
        .bind(priority)
        .bind(&payload)
        .bind(defaults::JOB_MAX_RETRIES)
        .bind(visible_after)
        .bind(now)
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.is_some() {
            self.notify.notify_waiters();
        }
        Ok(result)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let type_strings: Vec<String> = job_types
            .iter()
            .map(|jt| Self::job_type_to_str(*jt).to_string())
            .collect();

        // FOR UPDATE SKIP LOCKED for concurrent workers. Jobs stay
        // invisible until their visible_after instant passes; that is how
        // the staggered fan-out and deferred notification are enforced.
        // Empty array = claim any type.
        let query = format!(
            "UPDATE job_queue
             SET status = 'running'::job_status, started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'::job_status
                   AND visible_after <= $1
                   AND (cardinality($2::text[]) = 0 OR job_type::text = ANY($2))
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            Self::COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(&type_strings)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed'::job_status, completed_at = $1
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM job_queue WHERE id = $1")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retry_count < max_retries {
            // Retry: reset to pending with incremented retry count.
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending'::job_status, retry_count = $1, error_message = $2,
                     started_at = NULL
                 WHERE id = $3",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            // Retry budget exhausted: terminal failure.
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed'::job_status, completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let query = format!("SELECT {} FROM job_queue WHERE id = $1", Self::COLUMNS);
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_queue WHERE status = 'pending'::job_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_round_trip() {
        let types = [
            JobType::TenantSync,
            JobType::ConnectionSync,
            JobType::AccountSync,
            JobType::TransactionEmbed,
            JobType::TransactionNotify,
        ];

        for job_type in types {
            let str_repr = PgJobQueue::job_type_to_str(job_type);
            assert_eq!(PgJobQueue::str_to_job_type(str_repr), job_type);
        }
    }

    #[test]
    fn test_job_type_strings_are_unique() {
        let mut strings: Vec<&str> = [
            JobType::TenantSync,
            JobType::ConnectionSync,
            JobType::AccountSync,
            JobType::TransactionEmbed,
            JobType::TransactionNotify,
        ]
        .iter()
        .map(|t| PgJobQueue::job_type_to_str(*t))
        .collect();
        let len = strings.len();
        strings.sort();
        strings.dedup();
        assert_eq!(strings.len(), len);
    }

    #[test]
    fn test_str_to_job_status_all_variants() {
        assert_eq!(PgJobQueue::str_to_job_status("pending"), JobStatus::Pending);
        assert_eq!(PgJobQueue::str_to_job_status("running"), JobStatus::Running);
        assert_eq!(
            PgJobQueue::str_to_job_status("completed"),
            JobStatus::Completed
        );
        assert_eq!(PgJobQueue::str_to_job_status("failed"), JobStatus::Failed);
        assert_eq!(
            PgJobQueue::str_to_job_status("cancelled"),
            JobStatus::Cancelled
        );
        assert_eq!(PgJobQueue::str_to_job_status("other"), JobStatus::Pending);
    }
}
