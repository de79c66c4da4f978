//! Overlapping, boundary-aware text chunking.
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is
//! never cut inside a code point.
use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_size: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".into()));
        }
        if overlap >= max_size {
            return Err(Error::InvalidConfig(format!("chunk overlap ({overlap}) must be smaller than chunk size ({max_size})")));
        }
        Ok(Self { max_size, overlap })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    pub fn config(&self) -> ChunkingConfig { self.config }

    pub fn split(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.config.max_size, self.config.overlap)
    }

    /// Chunk every document independently and flatten the result, keeping
    /// document order and each document's chunk order.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut all_chunks = Vec::new();
        for (document_index, document) in documents.iter().enumerate() {
            let texts = self.split(&document.content);
            let total_chunks = texts.len();
            all_chunks.extend(texts.into_iter().enumerate().map(|(chunk_index, text)| Chunk { text, document_index, chunk_index, total_chunks }));
        }
        all_chunks
    }
}

/// Split `text` into overlapping fragments of at most `max_size` characters.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    chunk_spans(text, max_size, overlap).into_iter().map(|span| text[span].to_string()).collect()
}

/// Byte ranges of the fragments [`chunk_text`] would produce.
///
/// Consecutive spans overlap by at most `overlap` characters; the next span
/// always starts strictly after the previous one, so the scan terminates
/// even when the overlap exceeds a short sentence cut.
pub fn chunk_spans(text: &str, max_size: usize, overlap: usize) -> Vec<Range<usize>> {
    if text.is_empty() || max_size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n <= max_size {
        return vec![0..text.len()];
    }
    let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let min_sentence = max_size / 4;

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < n {
        let window_end = (start + max_size).min(n);
        let cut = if window_end == n { n } else { find_cut(&chars, start, window_end, min_sentence) };
        spans.push(bounds[start]..bounds[cut]);
        if cut >= n {
            break;
        }
        start = cut.saturating_sub(overlap).max(start + 1);
    }
    spans
}

fn is_terminator(c: char) -> bool { matches!(c, '.' | '!' | '?') }

/// Choose the exclusive end of the fragment starting at `start`, where
/// `end < chars.len()`: after the nearest sentence terminator, else at the
/// nearest whitespace, else exactly at `end`.
fn find_cut(chars: &[char], start: usize, end: usize, min_sentence: usize) -> usize {
    for p in (start + 1..=end).rev() {
        if is_terminator(chars[p - 1]) && chars[p].is_whitespace() {
            if p - start > min_sentence {
                return p;
            }
            break;
        }
    }
    for p in (start + 1..=end).rev() {
        if chars[p].is_whitespace() {
            return p;
        }
    }
    end
}
