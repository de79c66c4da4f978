//! OpenAI-compatible embeddings client (`POST {base_url}/embeddings`).
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragkit_core::config::EmbeddingSettings;
use ragkit_core::error::{Error, Result};
use ragkit_core::traits::EmbeddingBackend;
use ragkit_core::types::Embedding;

/// OpenAI accepts up to 2048 inputs per request.
const PROVIDER_MAX_BATCH: usize = 2048;

pub struct OpenAiEmbedder {
    base_url: String,
    api_key: Secret<String>,
    model: String,
    dimension: usize,
    max_batch_size: usize,
    http: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>, model: impl Into<String>, dimension: usize) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') { base_url.pop(); }
        Self {
            base_url,
            api_key,
            model: model.into(),
            dimension,
            max_batch_size: PROVIDER_MAX_BATCH,
            http: Client::new(),
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| Error::InvalidConfig("embedding.api_key (or OPENAI_API_KEY) is required".into()))?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            max_batch_size: settings.max_batch_size.clamp(1, PROVIDER_MAX_BATCH),
            ..Self::new(settings.base_url.clone(), api_key, settings.model.clone(), settings.dimension)
        })
    }

    fn embeddings_url(&self) -> String { format!("{}/embeddings", self.base_url) }
}

/// Map a transport-level failure onto the retry taxonomy.
fn classify_transport(err: reqwest::Error) -> Error {
    if err.is_decode() || err.is_builder() {
        Error::Permanent(format!("embedding request failed: {err}"))
    } else {
        Error::Transient(format!("embedding request failed: {err}"))
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbedder {
    fn model(&self) -> &str { &self.model }

    fn dimension(&self) -> usize { self.dimension }

    fn max_batch_size(&self) -> usize { self.max_batch_size }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let payload = EmbeddingRequest { model: &self.model, input: texts, dimensions: self.dimension };
        let resp = self
            .http
            .post(self.embeddings_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::from_http_status(status.as_u16(), &body));
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(classify_transport)?;
        let mut data = parsed.data;
        // The API documents `index`; order by it when present.
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let e = OpenAiEmbedder::new("http://localhost:1234/v1//", Secret::new("k".into()), "m", 8);
        assert_eq!(e.embeddings_url(), "http://localhost:1234/v1/embeddings");
    }
}
