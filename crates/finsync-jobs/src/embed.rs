//! Embedding and enrichment pipeline for newly inserted transactions.
//!
//! Enrichment is best effort: a failing categorization service never
//! blocks the embedding work. Embedding itself is mandatory and exact:
//! the model must return one vector per input text, and a mismatched
//! batch aborts the job rather than storing misaligned vectors.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use finsync_core::{
    defaults, transform, Error, JobType, NewTransactionEmbedding, Result, Transaction,
    TransactionEmbedPayload,
};

use crate::context::SyncContext;
use crate::handler::{JobContext, JobHandler, JobResult};

/// Enriches and embeds a batch of newly inserted transactions.
pub struct TransactionEmbedHandler {
    ctx: SyncContext,
}

impl TransactionEmbedHandler {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    #[instrument(
        skip(self, job),
        fields(subsystem = "pipeline", component = "embedding", op = "execute")
    )]
    async fn run(&self, job: &JobContext) -> Result<()> {
        let payload: TransactionEmbedPayload = job.payload_as()?;
        if payload.transaction_ids.is_empty() {
            return Ok(());
        }

        // Best-effort enrichment before embedding, so the embedded text
        // can pick up a category when the service is healthy.
        if let Err(e) = self
            .ctx
            .enricher
            .enrich(&payload.transaction_ids, payload.tenant_id)
            .await
        {
            warn!(
                tenant_id = %payload.tenant_id,
                input_count = payload.transaction_ids.len(),
                error = %e,
                "Enrichment failed, continuing with embedding"
            );
        }

        // Re-read after enrichment and drop anything already embedded,
        // so a retried job never double-embeds.
        let transactions = self
            .ctx
            .transactions
            .fetch_unembedded(&payload.transaction_ids)
            .await?;
        if transactions.is_empty() {
            debug!(tenant_id = %payload.tenant_id, "Nothing left to embed");
            return Ok(());
        }

        let mut embedded = 0usize;
        for (batch_index, batch) in transactions.chunks(defaults::EMBED_BATCH_SIZE).enumerate() {
            embedded += self.embed_batch(batch, payload.tenant_id, batch_index).await?;
        }

        info!(
            tenant_id = %payload.tenant_id,
            input_count = payload.transaction_ids.len(),
            inserted_count = embedded,
            model = self.ctx.embedder.model_name(),
            "Transaction embedding complete"
        );
        Ok(())
    }

    /// Embed one batch. Transactions whose source text is blank are
    /// skipped; for the rest the model must return exactly one vector
    /// per text.
    async fn embed_batch(
        &self,
        batch: &[Transaction],
        tenant_id: uuid::Uuid,
        batch_index: usize,
    ) -> Result<usize> {
        let mut texts = Vec::with_capacity(batch.len());
        let mut subjects = Vec::with_capacity(batch.len());
        for tx in batch {
            let text = transform::embedding_text(tx);
            if text.is_empty() {
                debug!(transaction_id = %tx.id, "Skipping transaction with no embeddable text");
                continue;
            }
            texts.push(text);
            subjects.push(tx);
        }

        if texts.is_empty() {
            return Ok(0);
        }

        let vectors = self.ctx.embedder.embed_texts(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedding batch {} returned {} vectors for {} texts",
                batch_index,
                vectors.len(),
                texts.len()
            )));
        }

        let model = self.ctx.embedder.model_name().to_string();
        let rows: Vec<NewTransactionEmbedding> = subjects
            .iter()
            .zip(texts.into_iter().zip(vectors))
            .map(|(tx, (source_text, vector))| NewTransactionEmbedding {
                transaction_id: tx.id,
                tenant_id,
                vector,
                source_text,
                model: model.clone(),
            })
            .collect();

        let count = rows.len();
        self.ctx.embeddings.insert_batch(rows).await?;
        Ok(count)
    }
}

#[async_trait]
impl JobHandler for TransactionEmbedHandler {
    fn job_type(&self) -> JobType {
        JobType::TransactionEmbed
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.run(&ctx).await {
            Ok(()) => JobResult::Success,
            Err(e) => {
                warn!(error = %e, "Transaction embedding failed");
                match e {
                    // Model trouble is usually transient.
                    Error::Embedding(_) => JobResult::Retry(e.to_string()),
                    other => JobResult::from_error(other),
                }
            }
        }
    }
}
