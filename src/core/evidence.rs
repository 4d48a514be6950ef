//! Source attribution for answers.
//!
//! The registry shows the chunks returned with the latest answer and keeps a
//! session-wide set of every chunk id that has backed any answer. The set only
//! grows; it is emptied by an explicit clear and nothing else.

use crate::api::SourcePayload;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifier of a retrieved chunk.
///
/// Backends send either numbers or strings; both are normalized to their
/// string form so `3` and `"3"` name the same chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawChunkId", into = "String")]
pub struct ChunkId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChunkId {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<RawChunkId> for ChunkId {
    fn from(raw: RawChunkId) -> Self {
        match raw {
            RawChunkId::Integer(value) => ChunkId(value.to_string()),
            RawChunkId::Float(value) => ChunkId(value.to_string()),
            RawChunkId::Text(value) => ChunkId(value),
        }
    }
}

impl From<ChunkId> for String {
    fn from(value: ChunkId) -> Self {
        value.0
    }
}

impl From<&str> for ChunkId {
    fn from(value: &str) -> Self {
        ChunkId(value.to_string())
    }
}

impl From<u64> for ChunkId {
    fn from(value: u64) -> Self {
        ChunkId(value.to_string())
    }
}

impl ChunkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceChunk {
    pub chunk_id: ChunkId,
    pub source_name: String,
    pub content: String,
    pub word_count: u32,
    pub is_paragraph: bool,
    /// Always within `[0, 1]`.
    pub relevance_score: f64,
}

impl SourceChunk {
    pub fn new(
        chunk_id: impl Into<ChunkId>,
        source_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count() as u32;
        Self {
            chunk_id: chunk_id.into(),
            source_name: source_name.into(),
            content,
            word_count,
            is_paragraph: false,
            relevance_score: 0.0,
        }
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance_score = clamp_relevance(relevance);
        self
    }

    pub fn with_paragraph(mut self, is_paragraph: bool) -> Self {
        self.is_paragraph = is_paragraph;
        self
    }
}

impl From<SourcePayload> for SourceChunk {
    fn from(payload: SourcePayload) -> Self {
        Self {
            chunk_id: payload.chunk,
            source_name: payload
                .source
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            content: payload.content,
            word_count: payload.word_count,
            is_paragraph: payload.is_paragraph,
            relevance_score: clamp_relevance(payload.relevance),
        }
    }
}

pub const UNKNOWN_SOURCE: &str = "Unknown source";

fn clamp_relevance(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvidenceStats {
    /// Chunks in the current batch.
    pub total: usize,
    /// Distinct chunks used across the whole session.
    pub used: usize,
}

#[derive(Debug, Default)]
pub struct EvidenceRegistry {
    batch: Vec<SourceChunk>,
    used: HashSet<ChunkId>,
}

impl EvidenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current batch and marks every chunk in it as used.
    pub fn set_current_batch(&mut self, chunks: Vec<SourceChunk>) {
        self.used.extend(chunks.iter().map(|chunk| chunk.chunk_id.clone()));
        self.batch = chunks;
    }

    pub fn clear(&mut self) {
        self.batch.clear();
        self.used.clear();
    }

    /// Current batch in arrival order, optionally limited to used chunks.
    pub fn view(&self, used_only: bool) -> Vec<&SourceChunk> {
        self.batch
            .iter()
            .filter(|chunk| !used_only || self.used.contains(&chunk.chunk_id))
            .collect()
    }

    pub fn stats(&self) -> EvidenceStats {
        EvidenceStats {
            total: self.batch.len(),
            used: self.used.len(),
        }
    }

    pub fn current_batch(&self) -> &[SourceChunk] {
        &self.batch
    }

    pub fn is_used(&self, id: &ChunkId) -> bool {
        self.used.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() && self.used.is_empty()
    }
}
