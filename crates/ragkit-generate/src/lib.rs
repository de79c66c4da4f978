#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod gateway;
pub mod openai;
pub mod profile;
pub mod prompt;

pub use gateway::GenerationGateway;
pub use openai::OpenAiChat;
pub use profile::ModelProfile;

use std::sync::Arc;

use ragkit_core::config::GenerationSettings;
use ragkit_core::error::{Error, Result};
use ragkit_core::traits::GenerationBackend;

pub fn backend_from_settings(settings: &GenerationSettings) -> Result<Arc<dyn GenerationBackend>> {
    match settings.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::from_settings(settings)?)),
        other => Err(Error::InvalidConfig(format!("unknown generation.provider '{other}'"))),
    }
}
