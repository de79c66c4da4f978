//! Domain types shared by the gateways and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

pub type Embedding = Vec<f32>;
pub type VectorId = String;

/// Ordered metadata map restricted to scalar values.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Reserved key under which a fragment's text is duplicated in stored metadata.
pub const CONTENT_KEY: &str = "text";
/// Raw source path supplied by the caller; stripped from search results.
pub const SOURCE_KEY: &str = "source";
/// Human-readable source label derived from `SOURCE_KEY` on search.
pub const SOURCE_LABEL_KEY: &str = "filename";
pub const DOCUMENT_INDEX_KEY: &str = "document_index";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
pub const TOTAL_CHUNKS_KEY: &str = "total_chunks";

/// A scalar metadata value. Nested arrays, objects and nulls are rejected
/// when deserializing, so every map that crosses the boundary is flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self { Self::Text(v) }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self { Self::Integer(i64::try_from(v).unwrap_or(i64::MAX)) }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

/// Validate an arbitrary JSON object into [`Metadata`], naming the first
/// offending key when a value is not a scalar.
pub fn metadata_from_json(value: &serde_json::Value) -> Result<Metadata> {
    metadata_at("metadata", value)
}

fn metadata_at(field: &str, value: &serde_json::Value) -> Result<Metadata> {
    let serde_json::Value::Object(map) = value else {
        return Err(Error::invalid_input(field, "expected a JSON object"));
    };
    let mut out = Metadata::new();
    for (key, v) in map {
        let scalar = match v {
            serde_json::Value::Bool(b) => MetadataValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Integer(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => MetadataValue::Text(s.clone()),
            _ => return Err(Error::invalid_input(format!("{field}.{key}"), "value must be a string, number or boolean")),
        };
        out.insert(key.clone(), scalar);
    }
    Ok(out)
}

fn deserialize_metadata<'de, D>(deserializer: D) -> std::result::Result<Metadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    metadata_from_json(&value).map_err(serde::de::Error::custom)
}

/// Parse an index payload of the form `{"documents": [{"content", "metadata"}]}`.
///
/// Every rejection names its field by position, e.g. `documents[2].metadata.tags`.
pub fn documents_from_json(value: &serde_json::Value) -> Result<Vec<Document>> {
    let Some(items) = value.get("documents").and_then(serde_json::Value::as_array) else {
        return Err(Error::invalid_input("documents", "expected an array of documents"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let content = match item.get("content") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => return Err(Error::invalid_input(format!("documents[{i}].content"), "expected a string")),
            };
            let metadata = match item.get("metadata") {
                None | Some(serde_json::Value::Null) => Metadata::new(),
                Some(meta) => metadata_at(&format!("documents[{i}].metadata"), meta)?,
            };
            Ok(Document { content, metadata })
        })
        .collect()
}

/// A caller-supplied document. Immutable once submitted for indexing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A fragment of one document, positioned within its source batch.
///
/// - `document_index`: position of the source document in the submitted batch
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub document_index: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    /// Stored metadata for this fragment: the document's metadata, the text
    /// under [`CONTENT_KEY`] and the provenance fields. Reserved keys win
    /// over caller-supplied ones.
    pub fn stored_metadata(&self, document_metadata: &Metadata) -> Metadata {
        let mut meta = document_metadata.clone();
        meta.insert(CONTENT_KEY.to_string(), self.text.clone().into());
        meta.insert(DOCUMENT_INDEX_KEY.to_string(), self.document_index.into());
        meta.insert(CHUNK_INDEX_KEY.to_string(), self.chunk_index.into());
        meta.insert(TOTAL_CHUNKS_KEY.to_string(), self.total_chunks.into());
        meta
    }
}

/// Similarity metric of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Dotproduct => "dotproduct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Some(Metric::Cosine),
            "euclidean" | "l2" => Some(Metric::Euclidean),
            "dotproduct" | "dot" => Some(Metric::Dotproduct),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Desired shape of the target index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

/// What the backend reports about an existing index. `metric` is `None`
/// when the backend does not record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Option<Metric>,
    pub created: bool,
}

/// A vector as written to the backend. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: VectorId,
    pub embedding: Embedding,
    pub metadata: Metadata,
}

/// A raw nearest-neighbour match as returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: VectorId,
    /// Similarity in `[0, 1]`, higher is more similar.
    pub score: f32,
    pub metadata: Metadata,
}

/// A search hit after metadata hygiene: text lifted out as `content`,
/// raw text and source path removed from `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: VectorId,
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// One entry of an assembled retrieval context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Ordered, size-bounded context built from search hits.
///
/// `text` is `None` when nothing relevant was retrieved, which is distinct
/// from a present context whose rendering happens to be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub entries: Vec<ContextEntry>,
    pub text: Option<String>,
}

impl RetrievalContext {
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn len(&self) -> usize { self.entries.len() }
}

/// Aggregate index statistics for health and observability consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
    pub dimension: usize,
    pub index_fullness: f32,
}

/// Sampling parameters sent to a generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

/// A batch whose upsert failed after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub range: Range<usize>,
    pub error: String,
}

/// Outcome of a batched upsert. Ranges index into the submitted input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub total: usize,
    pub upserted: usize,
    pub succeeded: Vec<Range<usize>>,
    pub failed: Vec<FailedBatch>,
}

impl UpsertReport {
    pub fn is_complete(&self) -> bool { self.failed.is_empty() && self.upserted == self.total }
}
