#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod gateway;
pub mod lance;
pub mod memory;
pub mod schema;

pub use gateway::{IndexGateway, IndexReadiness};
pub use lance::LanceDbBackend;
pub use memory::InMemoryBackend;

use std::sync::Arc;

use ragkit_core::config::IndexSettings;
use ragkit_core::error::{Error, Result};
use ragkit_core::traits::VectorBackend;

/// Open the vector backend selected by `index.provider`.
pub async fn backend_from_settings(settings: &IndexSettings) -> Result<Arc<dyn VectorBackend>> {
    match settings.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryBackend::new(settings.capacity))),
        "lancedb" => {
            let uri = settings.resolved_uri();
            if let Some(parent) = uri.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::InvalidConfig(format!("cannot create {}: {e}", parent.display())))?;
            }
            Ok(Arc::new(LanceDbBackend::connect(&uri.to_string_lossy()).await?))
        }
        other => Err(Error::InvalidConfig(format!("unknown index.provider '{other}'"))),
    }
}
