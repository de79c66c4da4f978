//! Narrow boundaries to the three external services.
//!
//! Implementations classify every failure as [`Error::Transient`] or
//! [`Error::Permanent`](crate::Error::Permanent) and must not retry on their
//! own: retry policy lives in [`crate::retry`].
//!
//! [`Error::Transient`]: crate::Error::Transient
use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Embedding, IndexDescription, IndexSpec, IndexStats, IndexedVector, SamplingParams, SearchHit};

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier, for logs and health output.
    fn model(&self) -> &str;
    /// Length of every vector this backend returns.
    fn dimension(&self) -> usize;
    /// Largest number of inputs accepted by a single `embed` call.
    fn max_batch_size(&self) -> usize;
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Create the index when missing and describe it either way.
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexDescription>;
    /// Write `items` into `namespace`; same-id writes are last-write-wins.
    async fn upsert(&self, namespace: &str, items: &[IndexedVector]) -> Result<usize>;
    /// Nearest neighbours of `query` within `namespace`, best first.
    async fn search(&self, namespace: &str, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;
    async fn stats(&self, namespace: &str) -> Result<IndexStats>;
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, system: &str, user: &str, params: &SamplingParams) -> Result<String>;
}
