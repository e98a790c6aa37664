//! In-process vector index for development and tests
//!
//! Entries are kept per collection in a `DashMap`. Search is brute-force
//! cosine similarity over every entry of the collection.

use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{EntryId, IndexEntry, RetrievalResult, ScoredId};

use super::embedding::cosine_similarity;
use super::vector_index::VectorIndex;

/// In-memory vector index
#[derive(Default)]
pub struct InMemoryIndex {
    collections: DashMap<String, Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Drop every entry of a collection
    pub fn clear(&self, collection: &str) {
        self.collections.remove(collection);
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(entries.iter().cloned());

        tracing::debug!(
            collection,
            inserted = entries.len(),
            total = self.len(collection),
            "Inserted entries"
        );
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult> {
        let Some(entries) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            if entry.vector.len() != vector.len() {
                return Err(Error::retrieval_unavailable(format!(
                    "Query vector has {} dimensions but entry {} has {}",
                    vector.len(),
                    entry.id,
                    entry.vector.len()
                )));
            }
            scored.push(ScoredId {
                id: entry.id,
                score: cosine_similarity(vector, &entry.vector),
            });
        }

        // Ties break on id for stable ranking
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn fetch(&self, collection: &str, ids: &[EntryId]) -> Result<Vec<IndexEntry>> {
        let Some(entries) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let wanted: HashSet<EntryId> = ids.iter().copied().collect();
        Ok(entries
            .iter()
            .filter(|entry| wanted.contains(&entry.id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: EntryId, vector: Vec<f32>, text: &str) -> IndexEntry {
        IndexEntry::new(id, vector, text)
    }

    #[tokio::test]
    async fn test_search_empty_collection() {
        let index = InMemoryIndex::new();
        let hits = index.search("diary", &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());

        index.insert("diary", &[]).await.unwrap();
        let hits = index.search("diary", &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .insert(
                "diary",
                &[
                    entry(1, vec![0.0, 1.0], "north"),
                    entry(2, vec![1.0, 0.0], "east"),
                    entry(3, vec![0.8, 0.6], "north-east"),
                ],
            )
            .await
            .unwrap();

        let hits = index.search("diary", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<EntryId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let index = InMemoryIndex::new();
        index
            .insert("a", &[entry(1, vec![1.0, 0.0], "in a")])
            .await
            .unwrap();

        assert!(index.search("b", &[1.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(index.len("a"), 1);
        assert!(index.is_empty("b"));
    }

    #[tokio::test]
    async fn test_fetch_skips_unknown_ids() {
        let index = InMemoryIndex::new();
        index
            .insert(
                "diary",
                &[
                    entry(1, vec![1.0, 0.0], "one"),
                    entry(2, vec![0.0, 1.0], "two"),
                ],
            )
            .await
            .unwrap();

        let fetched = index.fetch("diary", &[2, 99]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].text, "two");

        assert!(index.fetch("missing", &[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_retrieval_error() {
        let index = InMemoryIndex::new();
        index
            .insert("diary", &[entry(1, vec![1.0, 0.0, 0.0], "three dims")])
            .await
            .unwrap();

        let err = index.search("diary", &[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
    }
}
