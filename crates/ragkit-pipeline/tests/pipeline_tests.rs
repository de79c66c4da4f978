use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use ragkit_core::chunker::{Chunker, ChunkingConfig};
use ragkit_core::error::{Error, ErrorKind, Result};
use ragkit_core::retry::{ResilientCaller, RetryPolicy};
use ragkit_core::traits::{GenerationBackend, VectorBackend};
use ragkit_core::types::{
    Document, IndexDescription, IndexSpec, IndexStats, IndexedVector, MetadataValue, Metric, SamplingParams, SearchHit,
};
use ragkit_embed::{EmbeddingGateway, FakeEmbedder};
use ragkit_generate::GenerationGateway;
use ragkit_pipeline::{
    HealthStatus, IndexRequest, IndexStage, QueryRequest, QueryStage, RagPipeline, Stage,
};
use ragkit_vector::{InMemoryBackend, IndexGateway, IndexReadiness};

const DIM: usize = 64;

#[derive(Default)]
struct RecordingGenerator {
    model: String,
    prompts: Mutex<Vec<(String, SamplingParams)>>,
}

#[async_trait]
impl GenerationBackend for RecordingGenerator {
    fn model(&self) -> &str { &self.model }
    async fn complete(&self, _system: &str, user: &str, params: &SamplingParams) -> Result<String> {
        self.prompts.lock().unwrap().push((user.to_string(), *params));
        Ok("answer".into())
    }
}

fn caller() -> ResilientCaller {
    ResilientCaller::new(RetryPolicy { max_attempts: 2, initial_delay: Duration::from_millis(1), call_timeout: None })
}

struct Harness {
    pipeline: RagPipeline,
    vectors: Arc<dyn VectorBackend>,
    generator: Arc<RecordingGenerator>,
}

async fn harness_with(vectors: Arc<dyn VectorBackend>, model: &str, chunking: ChunkingConfig) -> Harness {
    let generator = Arc::new(RecordingGenerator { model: model.into(), ..RecordingGenerator::default() });
    let embeddings = EmbeddingGateway::new(Arc::new(FakeEmbedder::new(DIM)), caller());
    let spec = IndexSpec { name: "rag-app".into(), dimension: DIM, metric: Metric::Cosine };
    let index = IndexGateway::new(vectors.clone(), caller(), spec, "__default__").with_batch_size(2);
    let readiness = index.ensure_index().await.expect("ensure index");
    let generation = GenerationGateway::new(generator.clone(), caller()).with_max_output_tokens(Some(1000));
    let pipeline = RagPipeline::new(Chunker::new(chunking), embeddings, index, generation).with_readiness(readiness);
    Harness { pipeline, vectors, generator }
}

async fn harness() -> Harness {
    harness_with(Arc::new(InMemoryBackend::default()), "gpt-4o-mini", ChunkingConfig::default()).await
}

fn index_request(contents: &[&str]) -> IndexRequest {
    IndexRequest { documents: contents.iter().map(|c| Document::new(*c)).collect() }
}

#[tokio::test]
async fn two_short_documents_become_two_fragments() {
    let h = harness().await;
    let resp = h.pipeline.index(index_request(&["The cat sat. It slept.", "Dogs bark."])).await.expect("index");
    assert_eq!(resp.indexed_count, 2);
    assert_eq!(resp.status, "success");

    let hits = h.vectors.search("__default__", &FakeEmbedder::new(DIM).embed_text("cat"), 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    let mut positions: Vec<(i64, i64, i64)> = hits
        .iter()
        .map(|hit| {
            let get = |k: &str| hit.metadata[k].as_i64().unwrap();
            (get("document_index"), get("chunk_index"), get("total_chunks"))
        })
        .collect();
    positions.sort();
    assert_eq!(positions, vec![(0, 0, 1), (1, 0, 1)]);
    assert!(hits.iter().all(|hit| hit.id.starts_with("chunk_")));
}

#[tokio::test]
async fn query_returns_answer_and_ordered_sources() {
    let h = harness().await;
    let docs = IndexRequest {
        documents: vec![
            Document::new("Fire needs fuel heat and oxygen.").with_metadata("source", "/corpus/fire/basics.txt"),
            Document::new("Water boils at one hundred degrees."),
            Document::new("Dogs bark at strangers."),
        ],
    };
    h.pipeline.index(docs).await.expect("index");

    let resp = h
        .pipeline
        .query(QueryRequest { query: "  fire needs fuel heat and oxygen  ".into(), top_k: Some(2), temperature: Some(0.3) })
        .await
        .expect("query");

    assert_eq!(resp.response, "answer");
    assert_eq!(resp.sources.len(), 2);
    assert!(resp.sources[0].score >= resp.sources[1].score);
    assert_eq!(resp.sources[0].content, "Fire needs fuel heat and oxygen.");
    assert_eq!(resp.sources[0].metadata.get("filename"), Some(&MetadataValue::Text("basics.txt".into())));
    assert!(!resp.sources[0].metadata.contains_key("text"));

    let prompts = h.generator.prompts.lock().unwrap();
    let (user, params) = &prompts[0];
    assert!(user.contains("Context 1:\nFire needs fuel heat and oxygen."));
    assert!(user.contains("Question: fire needs fuel heat and oxygen\n"), "query is trimmed");
    assert_eq!(params.temperature, 0.3);
}

#[tokio::test]
async fn query_against_empty_index_still_completes() {
    let h = harness().await;
    let resp = h.pipeline.query(QueryRequest::new("anything there?")).await.expect("query completes");
    assert!(resp.sources.is_empty());
    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].0.contains("No relevant context found."));
}

#[tokio::test]
async fn fixed_temperature_model_gets_adapted_parameters() {
    let h = harness_with(Arc::new(InMemoryBackend::default()), "gpt-5", ChunkingConfig::default()).await;
    h.pipeline
        .query(QueryRequest { query: "q".into(), top_k: None, temperature: Some(0.2) })
        .await
        .expect("query");
    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts[0].1, SamplingParams { temperature: 1.0, max_output_tokens: None });
}

#[tokio::test]
async fn invalid_requests_fail_at_received() {
    let h = harness().await;

    let cases = vec![
        (QueryRequest::new("   "), "query"),
        (QueryRequest { query: "q".into(), top_k: Some(0), temperature: None }, "top_k"),
        (QueryRequest { query: "q".into(), top_k: Some(21), temperature: None }, "top_k"),
        (QueryRequest { query: "q".into(), top_k: None, temperature: Some(2.5) }, "temperature"),
    ];
    for (request, field) in cases {
        let err = h.pipeline.query(request).await.unwrap_err();
        assert_eq!(err.stage, Stage::Query(QueryStage::Received));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains(field), "{err}");
    }

    let err = h.pipeline.index(IndexRequest { documents: vec![] }).await.unwrap_err();
    assert_eq!(err.stage, Stage::Index(IndexStage::Received));

    let err = h.pipeline.index(index_request(&["fine", " \n "])).await.unwrap_err();
    assert!(err.to_string().contains("documents[1].content"), "{err}");
    assert!(h.generator.prompts.lock().unwrap().is_empty(), "nothing reached the backends");
}

#[tokio::test]
async fn long_documents_are_chunked_with_positions() {
    let chunking = ChunkingConfig::new(40, 10).unwrap();
    let h = harness_with(Arc::new(InMemoryBackend::default()), "gpt-4o-mini", chunking).await;
    let text = "Collect dry tinder first. Build a small teepee of kindling. Light the tinder from upwind. Feed larger fuel slowly.";
    let resp = h.pipeline.index(index_request(&[text])).await.expect("index");
    assert!(resp.indexed_count > 1);
    assert_eq!(h.pipeline.stats().await.unwrap().total_vector_count, resp.indexed_count as u64);
}

/// Accepts the first `ok_batches` upsert calls, then fails every later one.
struct FailsAfter {
    inner: InMemoryBackend,
    ok_batches: usize,
    seen: Mutex<usize>,
}

#[async_trait]
impl VectorBackend for FailsAfter {
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexDescription> { self.inner.ensure_index(spec).await }
    async fn upsert(&self, namespace: &str, items: &[IndexedVector]) -> Result<usize> {
        let n = {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        if n > self.ok_batches { return Err(Error::Permanent("400 payload rejected".into())); }
        self.inner.upsert(namespace, items).await
    }
    async fn search(&self, namespace: &str, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.inner.search(namespace, query, top_k).await
    }
    async fn stats(&self, namespace: &str) -> Result<IndexStats> { self.inner.stats(namespace).await }
}

#[tokio::test]
async fn partial_upsert_surfaces_durably_written_count() {
    let backend = Arc::new(FailsAfter { inner: InMemoryBackend::default(), ok_batches: 1, seen: Mutex::new(0) });
    let h = harness_with(backend, "gpt-4o-mini", ChunkingConfig::default()).await;

    let err = h.pipeline.index(index_request(&["a one", "b two", "c three"])).await.unwrap_err();
    assert_eq!(err.stage, Stage::Index(IndexStage::Upserting));
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    assert_eq!(err.durably_written(), 2, "first batch of two was written");
    match &err.source {
        Error::PartialUpsert(report) => {
            assert_eq!(report.total, 3);
            assert_eq!(report.succeeded, vec![0..2]);
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].range, 2..3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn health_reports_each_service() {
    let h = harness().await;
    let report = h.pipeline.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.services.len(), 3);
    assert!(report.services["vector_store"].message.as_deref().unwrap().contains("Vectors: 0"));
    assert!(report.services["generation"].message.as_deref().unwrap().contains("gpt-4o-mini"));
}

#[tokio::test]
async fn degraded_readiness_degrades_health() {
    let h = harness().await;
    let pipeline = h.pipeline.with_readiness(IndexReadiness::Degraded("readiness probe failed".into()));
    let report = pipeline.health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.services["vector_store"].status, HealthStatus::Degraded);
    assert_eq!(report.services["embeddings"].status, HealthStatus::Healthy);
}
