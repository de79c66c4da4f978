use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ragkit_core::error::Result;
use ragkit_core::traits::EmbeddingBackend;
use ragkit_core::types::Embedding;

/// Deterministic hashed bag-of-words embedder. Texts sharing words land
/// close together, which is enough for offline runs and tests.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
    max_batch_size: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), max_batch_size: 256 } }

    pub fn with_max_batch_size(mut self, n: usize) -> Self { self.max_batch_size = n.max(1); self }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for FakeEmbedder {
    fn model(&self) -> &str { "fake-hashed-bow" }

    fn dimension(&self) -> usize { self.dim }

    fn max_batch_size(&self) -> usize { self.max_batch_size }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_embedder_shapes_and_determinism() {
        let embedder = FakeEmbedder::new(1024);
        let v1 = embedder.embed_text("hello world");
        let v2 = embedder.embed_text("hello world");

        assert_eq!(v1.len(), 1024, "embedding dim is 1024");
        let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
        for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    }

    #[test]
    fn punctuation_and_case_do_not_change_tokens() {
        let embedder = FakeEmbedder::new(64);
        assert_eq!(embedder.embed_text("Cat sat."), embedder.embed_text("cat sat"));
    }
}
