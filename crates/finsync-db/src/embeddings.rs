//! Transaction embedding repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use finsync_core::{
    new_v7, Error, NewTransactionEmbedding, Result, TransactionEmbeddingRepository,
};

/// PostgreSQL implementation of TransactionEmbeddingRepository backed by
/// pgvector.
pub struct PgTransactionEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgTransactionEmbeddingRepository {
    /// Create a new PgTransactionEmbeddingRepository with the given pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionEmbeddingRepository for PgTransactionEmbeddingRepository {
    async fn insert_batch(&self, rows: Vec<NewTransactionEmbedding>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for row in rows {
            // One live embedding per transaction; re-embedding replaces it.
            sqlx::query(
                "INSERT INTO transaction_embeddings
                     (id, transaction_id, tenant_id, embedding, source_text, model)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (transaction_id) DO UPDATE
                 SET embedding = EXCLUDED.embedding,
                     source_text = EXCLUDED.source_text,
                     model = EXCLUDED.model,
                     created_at = now()",
            )
            .bind(new_v7())
            .bind(row.transaction_id)
            .bind(row.tenant_id)
            .bind(&row.vector)
            .bind(&row.source_text)
            .bind(&row.model)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transaction_embeddings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}
