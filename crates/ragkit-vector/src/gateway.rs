//! Index Gateway: index lifecycle, batched upsert, search and stats over a
//! [`VectorBackend`], with every backend call routed through the retry wrapper.
use futures::stream::{self, StreamExt};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use ragkit_core::error::{Error, Result};
use ragkit_core::retry::ResilientCaller;
use ragkit_core::traits::VectorBackend;
use ragkit_core::types::{
    FailedBatch, IndexSpec, IndexStats, IndexedVector, MetadataValue, RetrievedChunk, SearchHit, UpsertReport,
    CONTENT_KEY, SOURCE_KEY, SOURCE_LABEL_KEY,
};

/// Outcome of [`IndexGateway::ensure_index`] when the index is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexReadiness {
    Ready,
    /// Usable, but a post-setup check failed. Reported by health checks.
    Degraded(String),
}

#[derive(Clone)]
pub struct IndexGateway {
    backend: Arc<dyn VectorBackend>,
    caller: ResilientCaller,
    spec: IndexSpec,
    namespace: String,
    batch_size: usize,
    concurrency: usize,
}

impl IndexGateway {
    pub fn new(backend: Arc<dyn VectorBackend>, caller: ResilientCaller, spec: IndexSpec, namespace: impl Into<String>) -> Self {
        Self { backend, caller, spec, namespace: namespace.into(), batch_size: 100, concurrency: 1 }
    }

    pub fn with_batch_size(mut self, n: usize) -> Self { self.batch_size = n.max(1); self }

    pub fn with_concurrency(mut self, n: usize) -> Self { self.concurrency = n.max(1); self }

    pub fn spec(&self) -> &IndexSpec { &self.spec }

    pub fn namespace(&self) -> &str { &self.namespace }

    /// Create the index if missing. Idempotent. A dimension mismatch with an
    /// existing index is fatal; a failed readiness probe is not.
    pub async fn ensure_index(&self) -> Result<IndexReadiness> {
        let desc = self.caller.execute("ensure_index", || self.backend.ensure_index(&self.spec)).await?;
        if desc.dimension != self.spec.dimension {
            return Err(Error::InvalidConfig(format!(
                "index '{}' has dimension {} but embedding.dimension is {}",
                desc.name, desc.dimension, self.spec.dimension
            )));
        }
        let mut readiness = IndexReadiness::Ready;
        if let Some(metric) = desc.metric.filter(|m| *m != self.spec.metric) {
            warn!(index = %desc.name, existing = %metric, configured = %self.spec.metric, "index metric differs from configuration");
            readiness = IndexReadiness::Degraded(format!("index uses {metric}, configured {}", self.spec.metric));
        }
        if desc.created {
            info!(index = %desc.name, dimension = desc.dimension, "created index");
            if let Err(e) = self.stats().await {
                warn!(index = %desc.name, error = %e, "index created but readiness probe failed");
                readiness = IndexReadiness::Degraded(format!("readiness probe failed: {e}"));
            }
        }
        Ok(readiness)
    }

    /// Upsert in input order, `batch_size` vectors per backend call. Failed
    /// batches are recorded in the report, never dropped silently.
    pub async fn upsert(&self, items: &[IndexedVector]) -> Result<UpsertReport> {
        if let Some(bad) = items.iter().find(|v| v.embedding.len() != self.spec.dimension) {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: bad.embedding.len() });
        }
        let ranges: Vec<Range<usize>> = (0..items.len())
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(items.len()))
            .collect();

        let outcomes: Vec<(Range<usize>, Result<usize>)> = stream::iter(ranges)
            .map(|range| async move {
                let batch = &items[range.clone()];
                let outcome = self.caller.execute("upsert", || self.backend.upsert(&self.namespace, batch)).await;
                (range, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = UpsertReport { total: items.len(), ..UpsertReport::default() };
        for (range, outcome) in outcomes {
            match outcome {
                Ok(_) => {
                    report.upserted += range.len();
                    report.succeeded.push(range);
                }
                Err(e) => {
                    warn!(start = range.start, end = range.end, error = %e, "upsert batch failed");
                    report.failed.push(FailedBatch { range, error: e.to_string() });
                }
            }
        }
        debug!(total = report.total, upserted = report.upserted, failed = report.failed.len(), "upsert finished");
        Ok(report)
    }

    /// The `top_k` nearest fragments, best first, with metadata cleaned for callers.
    pub async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(Error::invalid_input("top_k", "must be at least 1"));
        }
        if query.len() != self.spec.dimension {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: query.len() });
        }
        let mut hits = self.caller.execute("search", || self.backend.search(&self.namespace, query, top_k)).await?;
        // Stable, so equal scores keep backend order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits.into_iter().map(retrieved_chunk).collect())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.caller.execute("stats", || self.backend.stats(&self.namespace)).await
    }
}

/// Lift the stored text out as `content`, replace the raw `source` path with
/// its last component under `filename`, and drop both raw keys.
pub fn retrieved_chunk(hit: SearchHit) -> RetrievedChunk {
    let SearchHit { id, score, mut metadata } = hit;
    let content = match metadata.remove(CONTENT_KEY) {
        Some(MetadataValue::Text(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    if let Some(source) = metadata.remove(SOURCE_KEY) {
        let source = source.to_string();
        let label = Path::new(&source)
            .file_name()
            .map_or_else(|| source.clone(), |name| name.to_string_lossy().into_owned());
        metadata.insert(SOURCE_LABEL_KEY.to_string(), MetadataValue::Text(label));
    }
    RetrievedChunk { id, content, score, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::types::Metadata;

    #[test]
    fn hygiene_strips_raw_keys_and_labels_source() {
        let mut metadata = Metadata::new();
        metadata.insert("text".into(), "Bow drill basics.".into());
        metadata.insert("source".into(), "/data/txt/fire/bow.txt".into());
        metadata.insert("category".into(), "fire".into());
        let chunk = retrieved_chunk(SearchHit { id: "1".into(), score: 0.9, metadata });

        assert_eq!(chunk.content, "Bow drill basics.");
        assert_eq!(chunk.metadata.get("filename"), Some(&MetadataValue::Text("bow.txt".into())));
        assert!(!chunk.metadata.contains_key("text"));
        assert!(!chunk.metadata.contains_key("source"));
        assert_eq!(chunk.metadata.len(), 2);
    }

    #[test]
    fn hygiene_without_source_adds_no_label() {
        let mut metadata = Metadata::new();
        metadata.insert("text".into(), "x".into());
        let chunk = retrieved_chunk(SearchHit { id: "1".into(), score: 0.5, metadata });
        assert!(chunk.metadata.is_empty());
    }
}
