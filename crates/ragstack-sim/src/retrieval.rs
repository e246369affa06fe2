//! Chunking and keyword retrieval over ingested documents.
//!
//! Stands in for embedding and vector search: documents are split into
//! word-count chunks following the data source's chunking policy, and a
//! question is matched against chunks by shared terms.

use std::collections::BTreeSet;

use ragstack_contracts::resource::{ChunkingPolicy, ChunkingStrategy};

/// One indexed chunk of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub source_uri: String,
    pub text: String,
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "how", "who", "why", "when", "with", "does",
    "can", "you", "your", "this", "that", "from", "have", "has", "into", "about", "which",
];

/// Split `text` into chunks of at most `max_tokens` words, each repeating
/// the last `overlap_percentage` percent of the previous chunk.
///
/// `ChunkingStrategy::None` keeps the document whole.
pub fn chunk_document(text: &str, policy: &ChunkingPolicy) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if policy.strategy == ChunkingStrategy::None || policy.max_tokens == 0 {
        return vec![words.join(" ")];
    }

    let size = policy.max_tokens as usize;
    let overlap = (size * policy.overlap_percentage as usize / 100).min(size - 1);
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Lowercased content words of `text`.
pub fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Up to `limit` passages sharing the most terms with `question`, best
/// first. Passages sharing no term are never returned; ties keep index
/// order.
pub fn top_passages<'a>(passages: &'a [Passage], question: &str, limit: usize) -> Vec<&'a Passage> {
    let wanted = terms(question);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize, &Passage)> = passages
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| {
            let score = terms(&p.text).intersection(&wanted).count();
            (score > 0).then_some((score, idx, p))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(limit).map(|(_, _, p)| p).collect()
}
