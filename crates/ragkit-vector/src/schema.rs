use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::collections::HashMap;
use std::sync::Arc;

use ragkit_core::types::Metric;

pub const ID_COLUMN: &str = "id";
pub const NAMESPACE_COLUMN: &str = "namespace";
pub const METADATA_COLUMN: &str = "metadata";
pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";
/// Schema-level metadata key recording the index metric.
pub const METRIC_KEY: &str = "metric";

pub fn build_arrow_schema(dimension: usize, metric: Metric) -> SchemaRef {
    let dim = i32::try_from(dimension).unwrap_or(i32::MAX);
    let fields = vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(NAMESPACE_COLUMN, DataType::Utf8, false),
        Field::new(METADATA_COLUMN, DataType::Utf8, false),
        Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ];
    let metadata = HashMap::from([(METRIC_KEY.to_string(), metric.as_str().to_string())]);
    Arc::new(Schema::new_with_metadata(fields, metadata))
}

/// Vector width of an existing table, read from its `vector` column.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

pub fn recorded_metric(schema: &Schema) -> Option<Metric> {
    schema.metadata().get(METRIC_KEY).and_then(|m| Metric::parse(m))
}
