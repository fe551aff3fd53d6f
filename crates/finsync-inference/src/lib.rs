//! # finsync-inference
//!
//! Model backends for finsync: batch embedding over an Ollama-compatible
//! API and best-effort LLM enrichment, plus deterministic mocks for
//! pipeline tests.

pub mod embedder;
pub mod enrichment;
pub mod mock;

pub use embedder::{HttpEmbedder, DEFAULT_EMBED_MODEL, DEFAULT_EMBED_URL};
pub use enrichment::{HttpEnricher, DEFAULT_ENRICH_URL};
pub use mock::{MockEmbedder, MockEnricher};
