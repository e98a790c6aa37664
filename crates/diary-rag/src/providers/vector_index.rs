//! Vector index trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EntryId, IndexEntry, RetrievalResult};

/// Append-only collection of (id, vector, text) entries
///
/// Every operation names its collection explicitly; the index never
/// interprets the name. Backend and transport failures surface as
/// `Error::RetrievalUnavailable` and are not retried here.
///
/// Implementations:
/// - `InMemoryIndex`: brute-force cosine search in process
/// - `ZillizIndex`: Zilliz Cloud / Milvus REST v2
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert entries. Ids must be unique within the collection; duplicates
    /// are not detected.
    async fn insert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Return at most `top_k` ids ranked by similarity descending. An empty
    /// or missing collection yields an empty result.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult>;

    /// Fetch entries by id. Result order is backend-defined and unknown ids
    /// are omitted.
    async fn fetch(&self, collection: &str, ids: &[EntryId]) -> Result<Vec<IndexEntry>>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
