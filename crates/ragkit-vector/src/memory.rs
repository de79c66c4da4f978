//! Process-local vector backend for development and tests.
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use ragkit_core::error::{Error, Result};
use ragkit_core::traits::VectorBackend;
use ragkit_core::types::{IndexDescription, IndexSpec, IndexStats, IndexedVector, Metric, SearchHit};

#[derive(Default)]
struct State {
    spec: Option<IndexSpec>,
    namespaces: HashMap<String, BTreeMap<String, IndexedVector>>,
}

pub struct InMemoryBackend {
    capacity: usize,
    state: RwLock<State>,
}

impl InMemoryBackend {
    /// `capacity` is the vector count reported as 100% full.
    pub fn new(capacity: usize) -> Self { Self { capacity: capacity.max(1), state: RwLock::new(State::default()) } }
}

impl Default for InMemoryBackend {
    fn default() -> Self { Self::new(1_000_000) }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 { return 0.0; }
    dot / (na.sqrt() * nb.sqrt())
}

/// Similarity in `[0, 1]` for the given metric.
fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b).clamp(0.0, 1.0),
        Metric::Dotproduct => a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>().clamp(0.0, 1.0),
        Metric::Euclidean => {
            let d2: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
            1.0 / (1.0 + d2)
        }
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexDescription> {
        let mut state = self.state.write().await;
        let (existing, created) = match &state.spec {
            Some(existing) => (existing.clone(), false),
            None => {
                state.spec = Some(spec.clone());
                (spec.clone(), true)
            }
        };
        Ok(IndexDescription { name: existing.name, dimension: existing.dimension, metric: Some(existing.metric), created })
    }

    async fn upsert(&self, namespace: &str, items: &[IndexedVector]) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.spec.is_none() { return Err(Error::NotFound("index has not been created".into())); }
        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        for item in items {
            ns.insert(item.id.clone(), item.clone());
        }
        Ok(items.len())
    }

    async fn search(&self, namespace: &str, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let Some(spec) = &state.spec else { return Err(Error::NotFound("index has not been created".into())) };
        let Some(ns) = state.namespaces.get(namespace) else { return Ok(Vec::new()) };
        let mut hits: Vec<SearchHit> = ns
            .values()
            .map(|v| SearchHit { id: v.id.clone(), score: score(spec.metric, query, &v.embedding), metadata: v.metadata.clone() })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn stats(&self, namespace: &str) -> Result<IndexStats> {
        let state = self.state.read().await;
        let Some(spec) = &state.spec else { return Err(Error::NotFound("index has not been created".into())) };
        let count = state.namespaces.get(namespace).map_or(0, BTreeMap::len);
        Ok(IndexStats {
            total_vector_count: count as u64,
            dimension: spec.dimension,
            index_fullness: (count as f32 / self.capacity as f32).min(1.0),
        })
    }
}
