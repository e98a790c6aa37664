//! Section- and paragraph-aware text chunking

use serde::Serialize;
use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::ChunkingRecord;

use super::boundary::{DiaryDateMatcher, RegexBoundaryMatcher, SectionBoundaryMatcher};

/// Default maximum chunk size in characters
pub const DEFAULT_MAX_UNIT_SIZE: usize = 800;

/// Splits document text into retrieval units
///
/// Header lines become their own unit. Inside a section, every blank-line
/// delimited paragraph becomes a unit, and paragraphs longer than
/// `max_unit_size` characters are split further by [`split_oversized`].
#[derive(Clone)]
pub struct Chunker {
    /// Maximum chunk size in characters
    max_unit_size: usize,
    /// Section boundary strategy
    matcher: Arc<dyn SectionBoundaryMatcher>,
}

impl Chunker {
    /// Create a chunker using diary date headers as section boundaries
    pub fn new(max_unit_size: usize) -> Self {
        Self::with_matcher(max_unit_size, DiaryDateMatcher::new())
    }

    /// Create a chunker with a custom boundary strategy
    pub fn with_matcher(
        max_unit_size: usize,
        matcher: impl SectionBoundaryMatcher + 'static,
    ) -> Self {
        Self {
            max_unit_size: max_unit_size.max(1),
            matcher: Arc::new(matcher),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        match &config.header_pattern {
            Some(pattern) => Ok(Self::with_matcher(
                config.max_unit_size,
                RegexBoundaryMatcher::new(pattern)?,
            )),
            None => Ok(Self::new(config.max_unit_size)),
        }
    }

    pub fn max_unit_size(&self) -> usize {
        self.max_unit_size
    }

    /// Chunk text into plain strings in document order
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_records(text)
            .into_iter()
            .map(|record| record.text)
            .collect()
    }

    /// Chunk text into records carrying ordinal and section marker
    pub fn chunk_records(&self, text: &str) -> Vec<ChunkingRecord> {
        let mut records = Vec::new();
        let mut marker: Option<String> = None;
        let mut section: Vec<&str> = Vec::new();

        for line in text.lines() {
            if let Some(header) = self.matcher.match_header(line) {
                self.flush_section(&section, &marker, &mut records);
                section.clear();

                self.push_unit(&header.marker, &Some(header.marker.clone()), &mut records);
                marker = Some(header.marker);
            } else {
                section.push(line);
            }
        }
        self.flush_section(&section, &marker, &mut records);

        tracing::debug!(
            matcher = self.matcher.name(),
            chunks = records.len(),
            "Chunked document"
        );

        records
    }

    /// Emit one unit per paragraph of a section
    fn flush_section(
        &self,
        lines: &[&str],
        marker: &Option<String>,
        records: &mut Vec<ChunkingRecord>,
    ) {
        let mut paragraph: Vec<&str> = Vec::new();

        for &line in lines {
            if line.trim().is_empty() {
                if !paragraph.is_empty() {
                    self.push_unit(&paragraph.join("\n"), marker, records);
                    paragraph.clear();
                }
            } else {
                paragraph.push(line);
            }
        }

        if !paragraph.is_empty() {
            self.push_unit(&paragraph.join("\n"), marker, records);
        }
    }

    fn push_unit(&self, text: &str, marker: &Option<String>, records: &mut Vec<ChunkingRecord>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if text.chars().count() <= self.max_unit_size {
            records.push(ChunkingRecord::new(records.len() + 1, text, marker.clone()));
            return;
        }

        for piece in split_oversized(text, self.max_unit_size) {
            records.push(ChunkingRecord::new(records.len() + 1, piece, marker.clone()));
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNIT_SIZE)
    }
}

/// Chunk `text` with the diary date matcher
pub fn chunk(text: &str, max_unit_size: usize) -> Vec<String> {
    Chunker::new(max_unit_size).chunk(text)
}

/// Split a unit longer than `max_chars` characters
///
/// Each cut lands after the last `.` within the window, else at the last
/// whitespace, else at exactly `max_chars`. Pieces are trimmed and never
/// empty.
pub fn split_oversized(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max_chars {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = window
            .rfind('.')
            .or_else(|| window.rfind(char::is_whitespace))
            .map(|idx| idx + window[idx..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(window_end);

        let head = rest[..cut].trim();
        if !head.is_empty() {
            parts.push(head.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        parts.push(rest.to_string());
    }

    parts
}

/// Summary of a chunking run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkingStats {
    /// Number of headed sections
    pub total_sections: usize,
    /// Number of emitted chunks
    pub total_chunks: usize,
    /// Chunks before the first header
    pub unlabeled_chunks: usize,
    /// Chunk count per section, in document order
    pub chunks_per_section: Vec<(String, usize)>,
    /// Average chunks per headed section
    pub avg_chunks_per_section: f64,
}

impl ChunkingStats {
    pub fn from_records(records: &[ChunkingRecord]) -> Self {
        let mut stats = Self {
            total_chunks: records.len(),
            ..Self::default()
        };

        for record in records {
            match &record.source_marker {
                None => stats.unlabeled_chunks += 1,
                Some(marker) => match stats.chunks_per_section.last_mut() {
                    Some((last, count)) if *last == *marker => *count += 1,
                    _ => stats.chunks_per_section.push((marker.clone(), 1)),
                },
            }
        }

        stats.total_sections = stats.chunks_per_section.len();
        if stats.total_sections > 0 {
            let labeled = stats.total_chunks - stats.unlabeled_chunks;
            stats.avg_chunks_per_section = labeled as f64 / stats.total_sections as f64;
        }

        stats
    }
}
