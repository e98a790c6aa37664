//! Document ingestion: text extraction, chunking and indexing

pub mod boundary;
pub mod chunker;
pub mod parser;
mod pipeline;

pub use boundary::{DiaryDateMatcher, RegexBoundaryMatcher, SectionBoundaryMatcher, SectionHeader};
pub use chunker::{chunk, split_oversized, Chunker, ChunkingStats, DEFAULT_MAX_UNIT_SIZE};
pub use parser::{collect_sources, extract_text, extract_text_from_bytes};
pub use pipeline::IngestPipeline;
