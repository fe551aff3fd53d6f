//! Transaction repository implementation.
//!
//! The upsert here is the idempotency anchor of the whole pipeline: rows
//! conflict on the stable dedup key and existing rows are never touched,
//! so re-syncing any window is safe.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use finsync_core::{
    defaults, new_v7, Error, NewTransaction, Result, Transaction, TransactionRepository,
    TransactionStatus,
};

/// PostgreSQL implementation of TransactionRepository.
pub struct PgTransactionRepository {
    pool: Pool<Postgres>,
}

impl PgTransactionRepository {
    /// Create a new PgTransactionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn status_to_str(status: TransactionStatus) -> &'static str {
        match status {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Posted => "posted",
        }
    }

    fn str_to_status(s: &str) -> TransactionStatus {
        match s {
            "pending" => TransactionStatus::Pending,
            "posted" => TransactionStatus::Posted,
            _ => TransactionStatus::Posted, // fallback
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Transaction {
        Transaction {
            id: row.get("id"),
            account_id: row.get("account_id"),
            tenant_id: row.get("tenant_id"),
            dedup_key: row.get("dedup_key"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            date: row.get("date"),
            name: row.get("name"),
            status: Self::str_to_status(row.get("status")),
            category: row.get("category"),
            counterparty_name: row.get("counterparty_name"),
            notified: row.get("notified"),
            created_at: row.get("created_at"),
        }
    }

    /// Upsert one batch (at most [`defaults::UPSERT_BATCH_SIZE`] rows)
    /// via UNNEST arrays, returning newly inserted ids.
    async fn upsert_chunk(&self, rows: &[NewTransaction]) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = rows.iter().map(|_| new_v7()).collect();
        let account_ids: Vec<Uuid> = rows.iter().map(|r| r.account_id).collect();
        let tenant_ids: Vec<Uuid> = rows.iter().map(|r| r.tenant_id).collect();
        let dedup_keys: Vec<String> = rows.iter().map(|r| r.dedup_key.clone()).collect();
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        let currencies: Vec<String> = rows.iter().map(|r| r.currency.clone()).collect();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        let statuses: Vec<String> = rows
            .iter()
            .map(|r| Self::status_to_str(r.status).to_string())
            .collect();
        let categories: Vec<Option<String>> = rows.iter().map(|r| r.category.clone()).collect();
        let counterparties: Vec<Option<String>> =
            rows.iter().map(|r| r.counterparty_name.clone()).collect();
        let notified: Vec<bool> = rows.iter().map(|r| r.notified).collect();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO transactions
                 (id, account_id, tenant_id, dedup_key, amount, currency, date,
                  name, status, category, counterparty_name, notified)
             SELECT id, account_id, tenant_id, dedup_key, amount, currency, date,
                    name, status::transaction_status, category, counterparty_name, notified
             FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::text[], $5::float8[],
                         $6::text[], $7::date[], $8::text[], $9::text[], $10::text[],
                         $11::text[], $12::bool[])
                  AS t(id, account_id, tenant_id, dedup_key, amount, currency, date,
                       name, status, category, counterparty_name, notified)
             ON CONFLICT (dedup_key) DO NOTHING
             RETURNING id",
        )
        .bind(&ids)
        .bind(&account_ids)
        .bind(&tenant_ids)
        .bind(&dedup_keys)
        .bind(&amounts)
        .bind(&currencies)
        .bind(&dates)
        .bind(&names)
        .bind(&statuses)
        .bind(&categories)
        .bind(&counterparties)
        .bind(&notified)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(inserted)
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn upsert_batch(&self, rows: &[NewTransaction]) -> Result<Vec<Uuid>> {
        let mut new_ids = Vec::new();
        for chunk in rows.chunks(defaults::UPSERT_BATCH_SIZE) {
            new_ids.extend(self.upsert_chunk(chunk).await?);
        }
        Ok(new_ids)
    }

    async fn fetch_unembedded(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT t.id, t.account_id, t.tenant_id, t.dedup_key, t.amount, t.currency,
                    t.date, t.name, t.status::text, t.category, t.counterparty_name,
                    t.notified, t.created_at
             FROM transactions t
             WHERE t.id = ANY($1)
               AND NOT EXISTS (
                   SELECT 1 FROM transaction_embeddings e WHERE e.transaction_id = t.id
               )
             ORDER BY t.date ASC, t.id ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn mark_notified(&self, tenant_id: Uuid) -> Result<i64> {
        let result = sqlx::query(
            "UPDATE transactions SET notified = true
             WHERE tenant_id = $1 AND notified = false",
        )
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() as i64)
    }
}
