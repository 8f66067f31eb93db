//! Section chunking with a sliding word window.
//!
//! A section that fits the token budget becomes one chunk. A larger section
//! is cut into windows of whitespace-delimited words; consecutive windows
//! overlap so a hit near a boundary still carries neighbouring sentences.
//!
//! Chunks are built in two phases. [`chunk_section`] produces
//! [`ChunkDraft`]s, which carry no total. Once every section of a document is
//! drafted, [`finalize_chunks`] turns the drafts into [`Chunk`]s that all
//! carry the same, final `total_chunks`.

use anyhow::{bail, Result};

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkMetadata, DocumentMetadata, Section, SectionType};
use crate::tokens::{estimate_tokens, tokens_to_words};

/// Validated window geometry derived from a [`ChunkingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    max_tokens: usize,
    window_words: usize,
    step_words: usize,
}

impl WindowPlan {
    /// Derive the word window from token budgets.
    ///
    /// Fails if the window is empty or the overlap leaves no forward step.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let window_words = tokens_to_words(config.max_tokens);
        let overlap_words = tokens_to_words(config.overlap_tokens);

        if window_words == 0 {
            bail!(
                "chunking.max_tokens = {} leaves an empty word window",
                config.max_tokens
            );
        }
        if overlap_words >= window_words {
            bail!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
                config.overlap_tokens,
                config.max_tokens
            );
        }

        Ok(Self {
            max_tokens: config.max_tokens,
            window_words,
            step_words: window_words - overlap_words,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn window_words(&self) -> usize {
        self.window_words
    }

    pub fn overlap_words(&self) -> usize {
        self.window_words - self.step_words
    }

    pub fn step_words(&self) -> usize {
        self.step_words
    }
}

impl Default for WindowPlan {
    fn default() -> Self {
        // 800 / 150 tokens => 600-word window, 112-word overlap.
        Self {
            max_tokens: 800,
            window_words: 600,
            step_words: 488,
        }
    }
}

/// A chunk whose document-wide total is not known yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub chunk_index: usize,
    pub content: String,
    pub section_type: SectionType,
    pub section_title: String,
    pub tokens: usize,
}

/// Split one section into drafts, numbering them from `start_index`.
///
/// The number of indices consumed is the length of the returned vector.
pub fn chunk_section(section: &Section, start_index: usize, plan: &WindowPlan) -> Vec<ChunkDraft> {
    let tokens = estimate_tokens(&section.text);

    if tokens <= plan.max_tokens {
        return vec![ChunkDraft {
            chunk_index: start_index,
            content: section.text.trim().to_string(),
            section_type: section.section_type,
            section_title: section.title.clone(),
            tokens,
        }];
    }

    split_large_section(section, start_index, plan)
}

fn split_large_section(section: &Section, start_index: usize, plan: &WindowPlan) -> Vec<ChunkDraft> {
    let words: Vec<&str> = section.text.split_whitespace().collect();
    let mut drafts = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + plan.window_words).min(words.len());
        let content = words[start..end].join(" ");
        let tokens = estimate_tokens(&content);

        drafts.push(ChunkDraft {
            chunk_index: start_index + drafts.len(),
            content,
            section_type: section.section_type,
            section_title: section.title.clone(),
            tokens,
        });

        start += plan.step_words;
    }

    drafts
}

/// Chunk identifier for the `index`-th chunk of a document.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", document_id, index)
}

/// Turn every draft of one document into a final chunk.
///
/// `drafts` must be the complete, ordered set for the document; the total is
/// taken from its length.
pub fn finalize_chunks(
    document_id: &str,
    base: &DocumentMetadata,
    drafts: Vec<ChunkDraft>,
) -> Vec<Chunk> {
    let total = drafts.len();
    drafts
        .into_iter()
        .map(|draft| Chunk {
            id: chunk_id(document_id, draft.chunk_index),
            content: draft.content,
            metadata: ChunkMetadata {
                document: base.clone(),
                chunk_index: draft.chunk_index,
                total_chunks: total,
                section_type: draft.section_type,
                section_title: draft.section_title,
                tokens: draft.tokens,
            },
        })
        .collect()
}

/// Draft every section in order with one running index, then finalize.
pub fn chunk_sections(
    document_id: &str,
    base: &DocumentMetadata,
    sections: &[Section],
    plan: &WindowPlan,
) -> Vec<Chunk> {
    let mut drafts: Vec<ChunkDraft> = Vec::new();
    for section in sections {
        let section_drafts = chunk_section(section, drafts.len(), plan);
        drafts.extend(section_drafts);
    }
    finalize_chunks(document_id, base, drafts)
}
