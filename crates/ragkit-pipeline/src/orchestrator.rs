//! The two end-to-end operations, Query and Index, as explicit stage machines.
//!
//! Each operation walks its stages in order. A failure at any stage ends the
//! operation with a [`PipelineError`] naming that stage.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use ragkit_core::chunker::Chunker;
use ragkit_core::error::{Error, ErrorKind, ErrorResponse};
use ragkit_core::types::{Document, IndexStats, IndexedVector, Metadata};
use ragkit_embed::EmbeddingGateway;
use ragkit_generate::GenerationGateway;
use ragkit_vector::{IndexGateway, IndexReadiness};

use crate::context::ContextAssembler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Received,
    EmbeddingQuery,
    Searching,
    ContextAssembled,
    Generating,
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStage {
    Received,
    Chunking,
    EmbeddingBatch,
    Upserting,
    Completed,
}

/// The stage an operation was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "stage", rename_all = "snake_case")]
pub enum Stage {
    Query(QueryStage),
    Index(IndexStage),
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::EmbeddingQuery => "embedding_query",
            Self::Searching => "searching",
            Self::ContextAssembled => "context_assembled",
            Self::Generating => "generating",
            Self::Responded => "responded",
        })
    }
}

impl fmt::Display for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::Chunking => "chunking",
            Self::EmbeddingBatch => "embedding_batch",
            Self::Upserting => "upserting",
            Self::Completed => "completed",
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(s) => write!(f, "query/{s}"),
            Self::Index(s) => write!(f, "index/{s}"),
        }
    }
}

/// Terminal `failed(stage)` state of an operation.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn query(stage: QueryStage) -> impl FnOnce(Error) -> Self {
        move |source| Self { stage: Stage::Query(stage), source }
    }

    fn index(stage: IndexStage) -> impl FnOnce(Error) -> Self {
        move |source| Self { stage: Stage::Index(stage), source }
    }

    pub fn kind(&self) -> ErrorKind { self.source.kind() }

    /// Fragments written to the index before the operation failed.
    pub fn durably_written(&self) -> usize {
        match &self.source {
            Error::PartialUpsert(report) => report.upserted,
            _ => 0,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse { error: self.kind(), message: self.to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self { Self { query: query.into(), top_k: None, temperature: None } }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexRequest {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResponse {
    /// Fragments written, not documents submitted.
    pub indexed_count: usize,
    pub status: String,
}

/// Request limits applied by [`RagPipeline::query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_temperature: f32,
}

impl Default for QueryLimits {
    fn default() -> Self { Self { default_top_k: 5, max_top_k: 20, default_temperature: 0.7 } }
}

/// Shared, immutable wiring of the three gateways. Safe to use from many
/// concurrent operations.
#[derive(Clone)]
pub struct RagPipeline {
    pub(crate) chunker: Chunker,
    pub(crate) embeddings: EmbeddingGateway,
    pub(crate) index: IndexGateway,
    pub(crate) generation: GenerationGateway,
    pub(crate) assembler: ContextAssembler,
    pub(crate) limits: QueryLimits,
    pub(crate) readiness: IndexReadiness,
}

fn enter<S: fmt::Display>(operation: &str, stage: S) {
    debug!(operation, stage = %stage, "stage");
}

impl RagPipeline {
    pub fn new(chunker: Chunker, embeddings: EmbeddingGateway, index: IndexGateway, generation: GenerationGateway) -> Self {
        Self {
            chunker,
            embeddings,
            index,
            generation,
            assembler: ContextAssembler::new(),
            limits: QueryLimits::default(),
            readiness: IndexReadiness::Ready,
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self { self.limits = limits; self }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self { self.assembler = assembler; self }

    pub fn with_readiness(mut self, readiness: IndexReadiness) -> Self { self.readiness = readiness; self }

    pub fn readiness(&self) -> &IndexReadiness { &self.readiness }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, PipelineError> {
        enter("query", QueryStage::Received);
        let (query, top_k, temperature) = self.validate_query(&request).map_err(PipelineError::query(QueryStage::Received))?;

        enter("query", QueryStage::EmbeddingQuery);
        let started = Instant::now();
        let query_vec = self.embeddings.embed_one(&query).await.map_err(PipelineError::query(QueryStage::EmbeddingQuery))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "embedding time");

        enter("query", QueryStage::Searching);
        let started = Instant::now();
        let hits = self.index.search(&query_vec, top_k).await.map_err(PipelineError::query(QueryStage::Searching))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, hits = hits.len(), "search time");

        let context = self.assembler.assemble(&hits, top_k);
        enter("query", QueryStage::ContextAssembled);
        if context.text.is_none() {
            info!("no relevant context found; generating without context");
        }

        enter("query", QueryStage::Generating);
        let started = Instant::now();
        let response = self
            .generation
            .generate(&query, &context, temperature)
            .await
            .map_err(PipelineError::query(QueryStage::Generating))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "generation time");

        enter("query", QueryStage::Responded);
        let sources = context
            .entries
            .into_iter()
            .map(|e| Source { content: e.content, metadata: e.metadata, score: e.score })
            .collect();
        Ok(QueryResponse { response, sources })
    }

    pub async fn index(&self, request: IndexRequest) -> Result<IndexResponse, PipelineError> {
        enter("index", IndexStage::Received);
        let documents = Self::validate_documents(request.documents).map_err(PipelineError::index(IndexStage::Received))?;

        enter("index", IndexStage::Chunking);
        let chunks = self.chunker.chunk_documents(&documents);
        info!(documents = documents.len(), fragments = chunks.len(), "chunked documents");

        enter("index", IndexStage::EmbeddingBatch);
        let started = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(PipelineError::index(IndexStage::EmbeddingBatch))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, fragments = embeddings.len(), "embedding time");

        enter("index", IndexStage::Upserting);
        let vectors: Vec<IndexedVector> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedVector {
                id: format!("chunk_{}", uuid::Uuid::new_v4().simple()),
                embedding,
                metadata: chunk.stored_metadata(&documents[chunk.document_index].metadata),
            })
            .collect();
        let started = Instant::now();
        let report = self.index.upsert(&vectors).await.map_err(PipelineError::index(IndexStage::Upserting))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, upserted = report.upserted, "upsert time");
        if !report.is_complete() {
            return Err(PipelineError::index(IndexStage::Upserting)(Error::PartialUpsert(report)));
        }

        enter("index", IndexStage::Completed);
        Ok(IndexResponse { indexed_count: report.upserted, status: "success".into() })
    }

    pub async fn stats(&self) -> ragkit_core::Result<IndexStats> { self.index.stats().await }

    fn validate_query(&self, request: &QueryRequest) -> ragkit_core::Result<(String, usize, f32)> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::invalid_input("query", "cannot be empty or only whitespace"));
        }
        let top_k = request.top_k.unwrap_or(self.limits.default_top_k);
        if top_k == 0 || top_k > self.limits.max_top_k {
            return Err(Error::invalid_input("top_k", format!("must be within 1..={}", self.limits.max_top_k)));
        }
        let temperature = request.temperature.unwrap_or(self.limits.default_temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::invalid_input("temperature", "must be within [0, 2]"));
        }
        Ok((query.to_string(), top_k, temperature))
    }

    fn validate_documents(documents: Vec<Document>) -> ragkit_core::Result<Vec<Document>> {
        if documents.is_empty() {
            return Err(Error::invalid_input("documents", "at least one document is required"));
        }
        documents
            .into_iter()
            .enumerate()
            .map(|(i, mut doc)| {
                let trimmed = doc.content.trim();
                if trimmed.is_empty() {
                    return Err(Error::invalid_input(format!("documents[{i}].content"), "cannot be empty or only whitespace"));
                }
                if trimmed.len() != doc.content.len() {
                    doc.content = trimmed.to_string();
                }
                Ok(doc)
            })
            .collect()
    }
}
