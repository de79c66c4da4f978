use figment::providers::{Format, Toml};
use figment::Figment;

use ragkit_core::config::{Config, Settings};
use ragkit_core::error::Error;
use ragkit_core::types::Metric;

fn config_from(toml: &str) -> Config {
    Config::from_figment(Figment::new().merge(Toml::string(toml)))
}

const FAKE_PROVIDERS: &str = r#"
[embedding]
provider = "fake"
dimension = 64

[generation]
api_key = "sk-test"

[index]
provider = "memory"
"#;

#[test]
fn defaults_fill_unspecified_sections() {
    let settings = config_from(FAKE_PROVIDERS).settings().expect("valid settings");
    assert_eq!(settings.embedding.dimension, 64);
    assert_eq!(settings.embedding.max_batch_size, 100);
    assert_eq!(settings.generation.model, "gpt-5");
    assert_eq!(settings.index.namespace, "__default__");
    assert_eq!(settings.index.metric, Metric::Cosine);
    assert_eq!(settings.chunking.chunk_size, 1000);
    assert_eq!(settings.chunking.chunk_overlap, 200);
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.query.default_top_k, 5);
    assert_eq!(settings.query.max_top_k, 20);
}

#[test]
fn overlap_not_below_chunk_size_is_rejected() {
    let toml = format!("{FAKE_PROVIDERS}\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
    let err = config_from(&toml).settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err:?}");
}

#[test]
fn unknown_provider_is_rejected() {
    let toml = FAKE_PROVIDERS.replace("provider = \"memory\"", "provider = \"pinecone\"");
    let err = config_from(&toml).settings().unwrap_err();
    assert!(err.to_string().contains("index.provider"), "{err}");
}

#[test]
fn openai_embedding_without_key_fails_validation() {
    let mut settings = Settings::default();
    settings.generation.api_key = None;
    settings.embedding.api_key = None;
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("api_key"), "{err}");
}

#[test]
fn out_of_range_values_fail_validation() {
    let base = config_from(FAKE_PROVIDERS).settings().expect("valid settings");

    let mut s = base.clone();
    s.generation.temperature = 2.5;
    assert!(s.validate().is_err());

    let mut s = base.clone();
    s.query.default_top_k = 21;
    assert!(s.validate().is_err());

    let mut s = base.clone();
    s.retry.max_attempts = 0;
    assert!(s.validate().is_err());

    let mut s = base;
    s.index.namespace = "  ".into();
    assert!(s.validate().is_err());
}

#[test]
fn retry_settings_map_to_policy() {
    let toml = format!("{FAKE_PROVIDERS}\n[retry]\nmax_attempts = 5\ninitial_delay_ms = 250\ncall_timeout_secs = 0\n");
    let settings = config_from(&toml).settings().expect("valid settings");
    let policy = settings.retry.policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.initial_delay.as_millis(), 250);
    assert!(policy.call_timeout.is_none());
}

#[test]
fn get_reads_nested_keys() {
    let cfg = config_from(FAKE_PROVIDERS);
    let provider: String = cfg.get("embedding.provider").unwrap();
    assert_eq!(provider, "fake");
    assert!(cfg.get::<String>("missing.key").is_err());
}
