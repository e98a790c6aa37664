//! Chunk records produced by the chunker

use serde::{Deserialize, Serialize};

/// One retrieval unit cut from a document
///
/// `ordinal` is dense and 1-based within a single chunking run. Fragments of
/// an oversized paragraph share the `source_marker` of their section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingRecord {
    pub ordinal: usize,
    pub text: String,
    /// Section header the chunk belongs to, `None` before the first header
    pub source_marker: Option<String>,
}

impl ChunkingRecord {
    /// Create a new record
    pub fn new(ordinal: usize, text: impl Into<String>, source_marker: Option<String>) -> Self {
        Self {
            ordinal,
            text: text.into(),
            source_marker,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
