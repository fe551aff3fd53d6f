//! Mock model backends for deterministic testing.
//!
//! The mock embedder derives vectors from character codes so the same text
//! always embeds identically; the mock enricher records calls and can be
//! toggled to fail for best-effort-path tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pgvector::Vector;
use uuid::Uuid;

use finsync_core::{EmbeddingBackend, EnrichmentBackend, Error, Result};

/// Deterministic mock embedding backend.
#[derive(Clone)]
pub struct MockEmbedder {
    dimension: usize,
    fail: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockEmbedder {
    /// Create a mock embedder with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Toggle failure mode.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Batch sizes of all embed calls, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// Generate a deterministic embedding from text.
    ///
    /// Character-code based so the same text always produces the same
    /// vector. Normalized to unit length.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.calls.lock().unwrap().push(texts.len());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Embedding("simulated embedding failure".into()));
        }
        Ok(texts
            .iter()
            .map(|t| Vector::from(Self::generate(t, self.dimension)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// One logged enrichment call.
#[derive(Debug, Clone)]
pub struct EnrichCall {
    pub tenant_id: Uuid,
    pub transaction_ids: Vec<Uuid>,
}

/// Mock enrichment backend with a failure toggle.
#[derive(Clone, Default)]
pub struct MockEnricher {
    fail: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<EnrichCall>>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle failure mode.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All logged enrichment calls.
    pub fn calls(&self) -> Vec<EnrichCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnrichmentBackend for MockEnricher {
    async fn enrich(&self, transaction_ids: &[Uuid], tenant_id: Uuid) -> Result<()> {
        self.calls.lock().unwrap().push(EnrichCall {
            tenant_id,
            transaction_ids: transaction_ids.to_vec(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Enrichment("simulated enrichment failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::new(128);
        let a = embedder.embed_texts(&["coffee".to_string()]).await.unwrap();
        let b = embedder.embed_texts(&["coffee".to_string()]).await.unwrap();
        assert_eq!(a[0].as_slice(), b[0].as_slice());
        assert_eq!(a[0].as_slice().len(), 128);
    }

    #[tokio::test]
    async fn test_mock_embedder_count_matches_input() {
        let embedder = MockEmbedder::new(64);
        let texts: Vec<String> = (0..7).map(|i| format!("tx {}", i)).collect();
        let vectors = embedder.embed_texts(&texts).await.unwrap();
        assert_eq!(vectors.len(), texts.len());
        assert_eq!(embedder.batch_sizes(), vec![7]);
    }

    #[tokio::test]
    async fn test_mock_embedder_failure_toggle() {
        let embedder = MockEmbedder::new(64);
        embedder.set_fail(true);
        assert!(embedder.embed_texts(&["x".to_string()]).await.is_err());
        embedder.set_fail(false);
        assert!(embedder.embed_texts(&["x".to_string()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_enricher_logs_and_fails() {
        let enricher = MockEnricher::new();
        let tenant = Uuid::new_v4();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        enricher.enrich(&ids, tenant).await.unwrap();
        let calls = enricher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].transaction_ids.len(), 2);

        enricher.set_fail(true);
        assert!(enricher.enrich(&ids, tenant).await.is_err());
    }

    #[test]
    fn test_generate_normalized() {
        let v = MockEmbedder::generate("spotify", 96);
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }
}
