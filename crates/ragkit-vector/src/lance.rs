//! LanceDB vector backend.
//!
//! One table per index. Rows carry `id`, `namespace`, the metadata map as a
//! JSON string, and a fixed-size `vector` column; the metric is recorded in
//! the table's schema metadata. Upserts are `merge_insert` on
//! (`id`, `namespace`), so repeated writes of one id are last-write-wins.
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, ArrayRef, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use ragkit_core::error::{Error, Result};
use ragkit_core::traits::VectorBackend;
use ragkit_core::types::{IndexDescription, IndexSpec, IndexStats, IndexedVector, Metadata, Metric, SearchHit};

use crate::schema::{
    build_arrow_schema, recorded_metric, vector_dimension, DISTANCE_COLUMN, ID_COLUMN, METADATA_COLUMN,
    NAMESPACE_COLUMN,
};

#[derive(Clone)]
struct ActiveTable {
    table: Table,
    dimension: usize,
    metric: Metric,
}

pub struct LanceDbBackend {
    db: Connection,
    active: RwLock<Option<ActiveTable>>,
}

fn lance_err(e: lancedb::Error) -> Error { Error::Permanent(format!("lancedb: {e}")) }

fn arrow_err(e: arrow_schema::ArrowError) -> Error { Error::Operation(format!("arrow: {e}")) }

fn namespace_filter(namespace: &str) -> String {
    format!("{NAMESPACE_COLUMN} = '{}'", namespace.replace('\'', "''"))
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::Cosine => DistanceType::Cosine,
        Metric::Euclidean => DistanceType::L2,
        Metric::Dotproduct => DistanceType::Dot,
    }
}

/// Convert a LanceDB distance into a similarity in `[0, 1]`.
/// A non-finite distance (e.g. cosine against a zero vector) scores 0.
fn distance_to_score(metric: Metric, distance: f32) -> f32 {
    if !distance.is_finite() { return 0.0; }
    match metric {
        Metric::Cosine | Metric::Dotproduct => (1.0 - distance).clamp(0.0, 1.0),
        Metric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
    }
}

impl LanceDbBackend {
    pub async fn connect(uri: &str) -> Result<Self> {
        let db = connect(uri).execute().await.map_err(lance_err)?;
        info!(uri, "opened lancedb");
        Ok(Self { db, active: RwLock::new(None) })
    }

    async fn active(&self) -> Result<ActiveTable> {
        self.active
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::NotFound("index has not been ensured; call ensure_index first".into()))
    }

    fn to_record_batch(active: &ActiveTable, namespace: &str, items: &[IndexedVector]) -> Result<RecordBatch> {
        let schema = build_arrow_schema(active.dimension, active.metric);
        let mut ids = Vec::with_capacity(items.len());
        let mut namespaces = Vec::with_capacity(items.len());
        let mut metadata = Vec::with_capacity(items.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(items.len());
        for item in items {
            ids.push(item.id.clone());
            namespaces.push(namespace.to_string());
            metadata.push(serde_json::to_string(&item.metadata).map_err(|e| Error::Operation(format!("metadata encode: {e}")))?);
            vectors.push(Some(item.embedding.iter().map(|&x| Some(x)).collect()));
        }
        let dim = i32::try_from(active.dimension).unwrap_or(i32::MAX);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(namespaces)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ];
        RecordBatch::try_new(schema, columns).map_err(arrow_err)
    }

    fn read_hits(batch: &RecordBatch, metric: Metric, out: &mut Vec<SearchHit>) -> Result<()> {
        let column = |name: &str| {
            batch.column_by_name(name).ok_or_else(|| Error::Operation(format!("search result missing column '{name}'")))
        };
        let ids = column(ID_COLUMN)?.as_string_opt::<i32>().ok_or_else(|| Error::Operation("id column is not utf8".into()))?;
        let metas = column(METADATA_COLUMN)?
            .as_string_opt::<i32>()
            .ok_or_else(|| Error::Operation("metadata column is not utf8".into()))?;
        let dists = column(DISTANCE_COLUMN)?
            .as_primitive_opt::<Float32Type>()
            .ok_or_else(|| Error::Operation("_distance column is not float32".into()))?;
        for i in 0..batch.num_rows() {
            if !ids.is_valid(i) || !dists.is_valid(i) { continue; }
            let metadata: Metadata = if metas.is_valid(i) {
                serde_json::from_str(metas.value(i)).map_err(|e| Error::Operation(format!("metadata decode: {e}")))?
            } else {
                Metadata::new()
            };
            out.push(SearchHit { id: ids.value(i).to_string(), score: distance_to_score(metric, dists.value(i)), metadata });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for LanceDbBackend {
    async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexDescription> {
        let names = self.db.table_names().execute().await.map_err(lance_err)?;
        let (table, created) = if names.contains(&spec.name) {
            (self.db.open_table(&spec.name).execute().await.map_err(lance_err)?, false)
        } else {
            // create empty table with 0 rows
            let schema = build_arrow_schema(spec.dimension, spec.metric);
            let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
            let table = self.db.create_table(&spec.name, Box::new(iter)).execute().await.map_err(lance_err)?;
            info!(table = %spec.name, dimension = spec.dimension, metric = %spec.metric, "created lancedb table");
            (table, true)
        };

        let schema = table.schema().await.map_err(lance_err)?;
        let dimension = vector_dimension(&schema)
            .ok_or_else(|| Error::InvalidConfig(format!("table '{}' has no fixed-size vector column", spec.name)))?;
        let metric = recorded_metric(&schema);
        debug!(table = %spec.name, dimension, ?metric, created, "lancedb table ready");

        *self.active.write().await =
            Some(ActiveTable { table, dimension, metric: metric.unwrap_or(spec.metric) });
        Ok(IndexDescription { name: spec.name.clone(), dimension, metric, created })
    }

    async fn upsert(&self, namespace: &str, items: &[IndexedVector]) -> Result<usize> {
        if items.is_empty() { return Ok(0); }
        let active = self.active().await?;
        let batch = Self::to_record_batch(&active, namespace, items)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let mut mi = active.table.merge_insert(&[ID_COLUMN, NAMESPACE_COLUMN]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await.map_err(lance_err)?;
        Ok(items.len())
    }

    async fn search(&self, namespace: &str, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let active = self.active().await?;
        let filter = namespace_filter(namespace);
        let mut stream = active
            .table
            .vector_search(query.to_vec())
            .map_err(lance_err)?
            .distance_type(distance_type(active.metric))
            .only_if(filter)
            .limit(top_k)
            .execute()
            .await
            .map_err(lance_err)?;
        let mut hits = Vec::with_capacity(top_k);
        while let Some(batch) = stream.try_next().await.map_err(lance_err)? {
            Self::read_hits(&batch, active.metric, &mut hits)?;
        }
        Ok(hits)
    }

    async fn stats(&self, namespace: &str) -> Result<IndexStats> {
        let active = self.active().await?;
        let count = active.table.count_rows(Some(namespace_filter(namespace))).await.map_err(lance_err)?;
        // Embedded storage has no fixed capacity.
        Ok(IndexStats { total_vector_count: count as u64, dimension: active.dimension, index_fullness: 0.0 })
    }
}
