//! Turns ranked search hits into the prompt context and its source list.
use ragkit_core::types::{ContextEntry, RetrievalContext, RetrievedChunk};

/// Separator between numbered context blocks in the prompt.
pub const CONTEXT_DELIMITER: &str = "\n\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler {
    /// Upper bound on the summed content length, in characters.
    max_chars: Option<usize>,
}

impl ContextAssembler {
    pub fn new() -> Self { Self::default() }

    pub fn with_max_chars(max_chars: Option<usize>) -> Self { Self { max_chars } }

    /// Take hits in the given order, up to `max_hits` and the character
    /// budget. The first hit is always admitted. Every admitted hit becomes
    /// an entry with its content unchanged; blank ones are left out of the
    /// prompt text only. Hits are never re-sorted here.
    pub fn assemble(&self, hits: &[RetrievedChunk], max_hits: usize) -> RetrievalContext {
        let mut entries: Vec<ContextEntry> = Vec::with_capacity(max_hits.min(hits.len()));
        let mut used = 0usize;
        for hit in hits.iter().take(max_hits) {
            let len = hit.content.chars().count();
            if let Some(budget) = self.max_chars {
                if !entries.is_empty() && used + len > budget { break; }
            }
            used += len;
            entries.push(ContextEntry { content: hit.content.clone(), metadata: hit.metadata.clone(), score: hit.score });
        }
        let blocks: Vec<String> = entries
            .iter()
            .map(|e| e.content.trim())
            .filter(|c| !c.is_empty())
            .enumerate()
            .map(|(i, c)| format!("Context {}:\n{c}", i + 1))
            .collect();
        let text = (!blocks.is_empty()).then(|| blocks.join(CONTEXT_DELIMITER));
        RetrievalContext { entries, text }
    }
}
