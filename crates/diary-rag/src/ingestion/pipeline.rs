//! Ingestion orchestration: chunk, embed, insert

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{Embedder, VectorIndex};
use crate::types::{ChunkingRecord, IndexEntry};

use super::chunker::Chunker;

/// Writes a document into the vector index
///
/// Entry ids are the chunk ordinals, a dense 1-based sequence per run.
/// Re-ingesting into a collection that was not cleared produces colliding
/// ids; avoiding that is up to the caller.
pub struct IngestPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    batch_size: usize,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            collection: collection.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Chunk without writing anything
    pub fn chunk_records(&self, text: &str) -> Vec<ChunkingRecord> {
        self.chunker.chunk_records(text)
    }

    /// Chunk, embed and insert a document. Returns the number of entries written.
    pub async fn ingest(&self, text: &str) -> Result<usize> {
        let records = self.chunker.chunk_records(text);
        self.ingest_records(&records).await
    }

    /// Embed and insert pre-chunked records in batches
    pub async fn ingest_records(&self, records: &[ChunkingRecord]) -> Result<usize> {
        if records.is_empty() {
            tracing::info!(collection = %self.collection, "Nothing to ingest");
            return Ok(0);
        }

        let expected = self.embedder.dimensions();
        let mut written = 0usize;

        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(Error::model_unavailable(format!(
                    "Embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            let entries = batch
                .iter()
                .zip(vectors)
                .map(|(record, vector)| {
                    if vector.len() != expected {
                        return Err(Error::DimensionMismatch {
                            expected,
                            actual: vector.len(),
                        });
                    }
                    Ok(IndexEntry::new(record.ordinal as u64, vector, record.text.clone()))
                })
                .collect::<Result<Vec<_>>>()?;

            self.index.insert(&self.collection, &entries).await?;
            written += entries.len();

            tracing::debug!(
                collection = %self.collection,
                written,
                total = records.len(),
                "Ingest batch stored"
            );
        }

        tracing::info!(
            collection = %self.collection,
            entries = written,
            embedder = self.embedder.name(),
            index = self.index.name(),
            "Ingest complete"
        );

        Ok(written)
    }
}
