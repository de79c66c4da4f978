//! One-time wiring of the pipeline from validated settings.
use tracing::info;

use ragkit_core::chunker::Chunker;
use ragkit_core::config::Settings;
use ragkit_core::error::{Error, Result};
use ragkit_core::retry::ResilientCaller;
use ragkit_core::types::IndexSpec;
use ragkit_embed::EmbeddingGateway;
use ragkit_generate::GenerationGateway;
use ragkit_vector::IndexGateway;

use crate::context::ContextAssembler;
use crate::orchestrator::{QueryLimits, RagPipeline};

/// Build every component, ensure the index exists, and return the pipeline.
///
/// Any error here is fatal: a dimension mismatch or missing credential must
/// stop the process before it serves a single operation.
pub async fn bootstrap(settings: &Settings) -> Result<RagPipeline> {
    settings.validate()?;
    let caller = ResilientCaller::new(settings.retry.policy());
    let chunker = Chunker::new(settings.chunking_config()?);

    let embed_backend = ragkit_embed::backend_from_settings(&settings.embedding)?;
    if embed_backend.dimension() != settings.embedding.dimension {
        return Err(Error::InvalidConfig(format!(
            "embedding backend produces {} dimensions, configured {}",
            embed_backend.dimension(),
            settings.embedding.dimension
        )));
    }
    let embeddings = EmbeddingGateway::new(embed_backend, caller)
        .with_max_batch_size(settings.embedding.max_batch_size)
        .with_concurrency(settings.embedding.concurrency);

    let vector_backend = ragkit_vector::backend_from_settings(&settings.index).await?;
    let spec = IndexSpec {
        name: settings.index.name.clone(),
        dimension: settings.embedding.dimension,
        metric: settings.index.metric,
    };
    let index = IndexGateway::new(vector_backend, caller, spec, settings.index.namespace.clone())
        .with_batch_size(settings.index.upsert_batch_size)
        .with_concurrency(settings.index.upsert_concurrency);
    let readiness = index.ensure_index().await?;

    let generation = GenerationGateway::new(ragkit_generate::backend_from_settings(&settings.generation)?, caller)
        .with_max_output_tokens(settings.generation.max_response_tokens);

    info!(
        embedding = embeddings.model(),
        generation = generation.model(),
        profile = %generation.profile(),
        index = %settings.index.name,
        namespace = %settings.index.namespace,
        ?readiness,
        "pipeline ready"
    );

    Ok(RagPipeline::new(chunker, embeddings, index, generation)
        .with_assembler(ContextAssembler::with_max_chars(settings.query.max_context_chars))
        .with_limits(QueryLimits {
            default_top_k: settings.query.default_top_k,
            max_top_k: settings.query.max_top_k,
            default_temperature: settings.generation.temperature,
        })
        .with_readiness(readiness))
}
