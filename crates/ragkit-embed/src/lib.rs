#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod fake;
pub mod gateway;
pub mod openai;

pub use fake::FakeEmbedder;
pub use gateway::EmbeddingGateway;
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

use ragkit_core::config::EmbeddingSettings;
use ragkit_core::error::{Error, Result};
use ragkit_core::traits::EmbeddingBackend;
use tracing::info;

/// Build the embedding backend selected by `embedding.provider`.
pub fn backend_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingBackend>> {
    match settings.provider.as_str() {
        "fake" => {
            info!(dimension = settings.dimension, "using fake embedder");
            Ok(Arc::new(FakeEmbedder::new(settings.dimension)))
        }
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_settings(settings)?)),
        other => Err(Error::InvalidConfig(format!("unknown embedding.provider '{other}'"))),
    }
}
