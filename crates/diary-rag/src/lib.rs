//! diary-rag: Grounded question answering over a diary-style document
//!
//! A document is split at dated day headers into paragraph units, embedded
//! and stored in a vector index. Questions run a sequential pipeline of
//! embed, search, fetch and generate, and always end in an outcome: an
//! answer with its evidence, an empty result, or a contained failure.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{Chunker, IngestPipeline};
pub use pipeline::{QueryStage, RagPipeline};
pub use types::{
    ChunkingRecord, EmptyReason, EntryId, IndexEntry, Outcome, QueryOutcome, RetrievalResult,
    ScoredId,
};
