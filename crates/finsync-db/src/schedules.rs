//! Schedule registration repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use finsync_core::{
    new_v7, Error, NewScheduleRegistration, Result, ScheduleRegistration, ScheduleRepository,
};

/// PostgreSQL implementation of ScheduleRepository.
///
/// Idempotency rests on the unique dedup_key column, never on in-memory
/// state: concurrent `ensure` calls race safely at the database.
pub struct PgScheduleRepository {
    pool: Pool<Postgres>,
}

impl PgScheduleRepository {
    /// Create a new PgScheduleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> ScheduleRegistration {
        ScheduleRegistration {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            dedup_key: row.get("dedup_key"),
            task: row.get("task"),
            cron: row.get("cron"),
            timezone: row.get("timezone"),
            enabled: row.get("enabled"),
        }
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn ensure(&self, registration: NewScheduleRegistration) -> Result<bool> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO schedule_registrations
                 (id, tenant_id, dedup_key, task, cron, timezone)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (dedup_key) DO NOTHING
             RETURNING id",
        )
        .bind(new_v7())
        .bind(registration.tenant_id)
        .bind(&registration.dedup_key)
        .bind(&registration.task)
        .bind(&registration.cron)
        .bind(&registration.timezone)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(inserted.is_some())
    }

    async fn remove(&self, dedup_key: &str) -> Result<()> {
        // Deleting an absent registration is success; teardown must be
        // repeatable.
        sqlx::query("DELETE FROM schedule_registrations WHERE dedup_key = $1")
            .bind(dedup_key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn find(&self, dedup_key: &str) -> Result<Option<ScheduleRegistration>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, dedup_key, task, cron, timezone, enabled
             FROM schedule_registrations WHERE dedup_key = $1",
        )
        .bind(dedup_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list_for_task(&self, task: &str) -> Result<Vec<ScheduleRegistration>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, dedup_key, task, cron, timezone, enabled
             FROM schedule_registrations WHERE task = $1
             ORDER BY created_at ASC",
        )
        .bind(task)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
