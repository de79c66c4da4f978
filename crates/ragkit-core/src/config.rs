//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_INDEX__NAMESPACE`), then extracts a
//! fully-defaulted [`Settings`]. Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::Metric;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Build from an explicit figment, e.g. in tests.
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings. Any failure here is fatal:
    /// the process must not serve requests with an invalid configuration.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if settings.embedding.api_key.is_none() {
            settings.embedding.api_key = env::var("OPENAI_API_KEY").ok().map(Secret::new);
        }
        if settings.generation.api_key.is_none() {
            settings.generation.api_key = env::var("OPENAI_API_KEY").ok().map(Secret::new);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub retry: RetrySettings,
    pub query: QuerySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `openai` or `fake`.
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub max_batch_size: usize,
    pub concurrency: usize,
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-large".into(),
            dimension: 1024,
            max_batch_size: 100,
            concurrency: 4,
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Only `openai` is supported.
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_response_tokens: Option<u32>,
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-5".into(),
            temperature: 0.7,
            max_response_tokens: Some(1000),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// `lancedb` or `memory`.
    pub provider: String,
    /// LanceDB location; `~` and `$VAR` are expanded.
    pub uri: String,
    pub name: String,
    pub namespace: String,
    pub metric: Metric,
    pub upsert_batch_size: usize,
    pub upsert_concurrency: usize,
    /// Vector capacity used to report fullness for the in-memory backend.
    pub capacity: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: "lancedb".into(),
            uri: "./data/lancedb".into(),
            name: "rag-app".into(),
            namespace: "__default__".into(),
            metric: Metric::Cosine,
            upsert_batch_size: 100,
            upsert_concurrency: 1,
            capacity: 1_000_000,
        }
    }
}

impl IndexSettings {
    pub fn resolved_uri(&self) -> PathBuf { expand_path(&self.uri) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let d = ChunkingConfig::default();
        Self { chunk_size: d.max_size, chunk_overlap: d.overlap }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Per-call timeout; `0` disables it.
    pub call_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self { Self { max_attempts: 3, initial_delay_ms: 1000, call_timeout_secs: 30 } }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            call_timeout: (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub max_context_chars: Option<usize>,
}

impl Default for QuerySettings {
    fn default() -> Self { Self { default_top_k: 5, max_top_k: 20, max_context_chars: None } }
}

impl Settings {
    pub fn chunking_config(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunking.chunk_size, self.chunking.chunk_overlap)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        self.chunking_config()?;
        if self.embedding.dimension == 0 { return invalid("embedding.dimension must be positive".into()); }
        if self.embedding.max_batch_size == 0 { return invalid("embedding.max_batch_size must be positive".into()); }
        if self.embedding.concurrency == 0 { return invalid("embedding.concurrency must be positive".into()); }
        if self.index.upsert_batch_size == 0 { return invalid("index.upsert_batch_size must be positive".into()); }
        if self.index.upsert_concurrency == 0 { return invalid("index.upsert_concurrency must be positive".into()); }
        if self.index.namespace.trim().is_empty() { return invalid("index.namespace must not be empty".into()); }
        if self.retry.max_attempts == 0 { return invalid("retry.max_attempts must be at least 1".into()); }
        if self.query.default_top_k == 0 || self.query.default_top_k > self.query.max_top_k {
            return invalid(format!("query.default_top_k must be within 1..={}", self.query.max_top_k));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid("generation.temperature must be within [0, 2]".into());
        }
        match self.embedding.provider.as_str() {
            "openai" if self.embedding.api_key.is_none() => return invalid("embedding.api_key (or OPENAI_API_KEY) is required for the openai provider".into()),
            "openai" | "fake" => {}
            other => return invalid(format!("unknown embedding.provider '{other}'")),
        }
        match self.generation.provider.as_str() {
            "openai" if self.generation.api_key.is_none() => return invalid("generation.api_key (or OPENAI_API_KEY) is required for the openai provider".into()),
            "openai" => {}
            other => return invalid(format!("unknown generation.provider '{other}'")),
        }
        match self.index.provider.as_str() {
            "lancedb" | "memory" => {}
            other => return invalid(format!("unknown index.provider '{other}'")),
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
