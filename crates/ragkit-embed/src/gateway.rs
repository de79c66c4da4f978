//! Embedding Gateway: text in, fixed-length vectors out.
//!
//! Inputs larger than the backend's batch limit are split into sub-batches
//! that run with bounded concurrency. Results are reassembled in input order,
//! and a single failing sub-batch fails the whole call.
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use ragkit_core::error::{Error, Result};
use ragkit_core::retry::ResilientCaller;
use ragkit_core::traits::EmbeddingBackend;
use ragkit_core::types::Embedding;

#[derive(Clone)]
pub struct EmbeddingGateway {
    backend: Arc<dyn EmbeddingBackend>,
    caller: ResilientCaller,
    max_batch_size: usize,
    concurrency: usize,
}

impl EmbeddingGateway {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, caller: ResilientCaller) -> Self {
        let max_batch_size = backend.max_batch_size().max(1);
        Self { backend, caller, max_batch_size, concurrency: 1 }
    }

    /// Lower the sub-batch size below the backend's own limit.
    pub fn with_max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n.clamp(1, self.backend.max_batch_size().max(1));
        self
    }

    /// Number of sub-batches allowed in flight at once.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn model(&self) -> &str { self.backend.model() }

    pub fn dimension(&self) -> usize { self.backend.dimension() }

    pub async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let input = [text.to_string()];
        let mut out = self.call_backend(&input).await?;
        out.pop().ok_or_else(|| Error::Permanent("embedding backend returned no vector".into()))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let started = Instant::now();
        let batches: Vec<Vec<Embedding>> = stream::iter(texts.chunks(self.max_batch_size))
            .map(|batch| self.call_backend(batch))
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        let embeddings: Vec<Embedding> = batches.into_iter().flatten().collect();
        debug!(
            inputs = texts.len(),
            batches = texts.len().div_ceil(self.max_batch_size),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedded batch"
        );
        Ok(embeddings)
    }

    async fn call_backend(&self, batch: &[String]) -> Result<Vec<Embedding>> {
        let out = self.caller.execute("embed", || self.backend.embed(batch)).await?;
        if out.len() != batch.len() {
            return Err(Error::Permanent(format!(
                "embedding backend returned {} vectors for {} inputs",
                out.len(),
                batch.len()
            )));
        }
        let expected = self.backend.dimension();
        if let Some(bad) = out.iter().find(|v| v.len() != expected) {
            return Err(Error::DimensionMismatch { expected, actual: bad.len() });
        }
        Ok(out)
    }
}
