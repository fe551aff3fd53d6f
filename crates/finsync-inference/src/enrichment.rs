//! LLM enrichment backend.
//!
//! Enrichment categorizes newly inserted transactions (merchant cleanup,
//! category assignment) through a model service that writes results back
//! to storage itself. It is strictly best-effort: the embed stage calls it
//! and swallows any error.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use finsync_core::{defaults, EnrichmentBackend, Error, Result};

/// Default enrichment endpoint.
pub const DEFAULT_ENRICH_URL: &str = defaults::ENRICH_URL;

#[derive(Serialize)]
struct EnrichRequest {
    tenant_id: Uuid,
    transaction_ids: Vec<Uuid>,
}

/// HTTP enrichment backend.
pub struct HttpEnricher {
    client: Client,
    base_url: String,
}

impl HttpEnricher {
    /// Create a new enricher against the default endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_ENRICH_URL.to_string())
    }

    /// Create a new enricher against a custom endpoint.
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::ENRICH_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Create from environment variables (`FINSYNC_ENRICH_URL`).
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("FINSYNC_ENRICH_URL").unwrap_or_else(|_| DEFAULT_ENRICH_URL.to_string());
        Self::with_base_url(base_url)
    }
}

#[async_trait]
impl EnrichmentBackend for HttpEnricher {
    async fn enrich(&self, transaction_ids: &[Uuid], tenant_id: Uuid) -> Result<()> {
        if transaction_ids.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let request = EnrichRequest {
            tenant_id,
            transaction_ids: transaction_ids.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/enrich", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Enrichment(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Enrichment(format!(
                "Enrichment service returned {}: {}",
                status, body
            )));
        }

        debug!(
            subsystem = "inference",
            component = "enricher",
            op = "enrich",
            tenant_id = %tenant_id,
            input_count = transaction_ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Enrichment complete"
        );
        Ok(())
    }
}
