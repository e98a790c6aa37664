//! Vector index records

use serde::{Deserialize, Serialize};

/// Identifier of an index entry, assigned at insert time
pub type EntryId = u64;

/// A stored (id, vector, text) record. Never mutated once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: EntryId,
    pub vector: Vec<f32>,
    pub text: String,
}

impl IndexEntry {
    pub fn new(id: EntryId, vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id,
            vector,
            text: text.into(),
        }
    }
}

/// One ranked search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: EntryId,
    /// Similarity score, higher is more similar
    pub score: f32,
}

/// Hits of a single search call, ranked by similarity descending
pub type RetrievalResult = Vec<ScoredId>;
