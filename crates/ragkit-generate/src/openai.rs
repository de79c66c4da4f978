//! OpenAI-compatible chat completions client (`POST {base_url}/chat/completions`).
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragkit_core::config::GenerationSettings;
use ragkit_core::error::{Error, Result};
use ragkit_core::traits::GenerationBackend;
use ragkit_core::types::SamplingParams;

pub struct OpenAiChat {
    base_url: String,
    api_key: Secret<String>,
    model: String,
    http: Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>, model: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') { base_url.pop(); }
        Self { base_url, api_key, model: model.into(), http: Client::new() }
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| Error::InvalidConfig("generation.api_key (or OPENAI_API_KEY) is required".into()))?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, ..Self::new(settings.base_url.clone(), api_key, settings.model.clone()) })
    }

    fn completions_url(&self) -> String { format!("{}/chat/completions", self.base_url) }
}

fn classify_transport(err: reqwest::Error) -> Error {
    if err.is_decode() || err.is_builder() {
        Error::Permanent(format!("chat request failed: {err}"))
    } else {
        Error::Transient(format!("chat request failed: {err}"))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiChat {
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, system: &str, user: &str, params: &SamplingParams) -> Result<String> {
        let payload = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "developer", content: system }, ChatMessage { role: "user", content: user }],
            temperature: params.temperature,
            max_completion_tokens: params.max_output_tokens,
        };
        let resp = self
            .http
            .post(self.completions_url())
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
        let parsed: ChatResponse = resp.json().await.map_err(classify_transport)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| Error::Permanent("chat completion returned no choices".into()))
    }
}
