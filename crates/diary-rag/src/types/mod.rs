//! Core types for the diary RAG system

pub mod chunk;
pub mod index;
pub mod outcome;
pub mod query;

pub use chunk::ChunkingRecord;
pub use index::{EntryId, IndexEntry, RetrievalResult, ScoredId};
pub use outcome::{EmptyReason, Outcome, QueryOutcome};
pub use query::{IngestRequest, IngestResponse, QueryRequest, QueryResponse};
