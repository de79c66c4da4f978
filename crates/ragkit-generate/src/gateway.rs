use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use ragkit_core::error::Result;
use ragkit_core::retry::ResilientCaller;
use ragkit_core::traits::GenerationBackend;
use ragkit_core::types::RetrievalContext;

use crate::profile::ModelProfile;
use crate::prompt::{user_prompt, SYSTEM_PROMPT};

/// Builds the grounded prompt and calls the generation backend once per
/// query, adapting sampling parameters to the model's profile.
#[derive(Clone)]
pub struct GenerationGateway {
    backend: Arc<dyn GenerationBackend>,
    caller: ResilientCaller,
    profile: ModelProfile,
    max_output_tokens: Option<u32>,
}

impl GenerationGateway {
    pub fn new(backend: Arc<dyn GenerationBackend>, caller: ResilientCaller) -> Self {
        let profile = ModelProfile::for_model(backend.model());
        Self { backend, caller, profile, max_output_tokens: None }
    }

    pub fn with_max_output_tokens(mut self, cap: Option<u32>) -> Self {
        self.max_output_tokens = cap;
        self
    }

    pub fn model(&self) -> &str { self.backend.model() }

    pub fn profile(&self) -> ModelProfile { self.profile }

    pub async fn generate(&self, query: &str, context: &RetrievalContext, temperature: f32) -> Result<String> {
        let params = self.profile.sampling(temperature, self.max_output_tokens);
        if params.temperature != temperature {
            debug!(model = self.model(), requested = temperature, applied = params.temperature, "temperature adapted to model profile");
        }
        let user = user_prompt(query, context);
        let started = Instant::now();
        let text = self.caller.execute("generate", || self.backend.complete(SYSTEM_PROMPT, &user, &params)).await?;
        info!(model = self.model(), elapsed_ms = started.elapsed().as_millis() as u64, chars = text.len(), "generated response");
        Ok(text)
    }
}
