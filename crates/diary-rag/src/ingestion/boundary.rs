//! Section boundary detection
//!
//! A boundary matcher decides which lines open a new logical section of a
//! document. The chunker never splits a paragraph across two sections.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// A line recognised as a section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Marker carried by every chunk of the section (the trimmed header line)
    pub marker: String,
    /// Optional title portion of the header
    pub title: Option<String>,
}

/// Strategy deciding whether a line starts a new section
///
/// Implementations:
/// - `DiaryDateMatcher`: `"<day> Day of <month> <year> - <title>"` headers
/// - `RegexBoundaryMatcher`: any user-supplied pattern
pub trait SectionBoundaryMatcher: Send + Sync {
    /// Return the header if `line` opens a new section
    fn match_header(&self, line: &str) -> Option<SectionHeader>;

    /// Get matcher name for logging
    fn name(&self) -> &str;
}

const DIARY_DATE_PATTERN: &str =
    r"^(?P<day>\d{1,2})(?:st|nd|rd|th)? Day of (?P<month>[A-Za-z]+) (?P<year>\d{4}) - (?P<title>.+)$";

fn diary_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DIARY_DATE_PATTERN).expect("diary date pattern is valid"))
}

/// Matches diary day headers such as `1st Day of Snowrest 1856 - Arrival`
#[derive(Debug, Clone, Copy, Default)]
pub struct DiaryDateMatcher;

impl DiaryDateMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl SectionBoundaryMatcher for DiaryDateMatcher {
    fn match_header(&self, line: &str) -> Option<SectionHeader> {
        let line = line.trim();
        let caps = diary_date_regex().captures(line)?;

        let day: u32 = caps.name("day")?.as_str().parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }

        Some(SectionHeader {
            marker: line.to_string(),
            title: caps.name("title").map(|t| t.as_str().trim().to_string()),
        })
    }

    fn name(&self) -> &str {
        "diary-date"
    }
}

/// Matches headers with an arbitrary regex. A `title` capture group is used
/// as the section title when present.
#[derive(Debug, Clone)]
pub struct RegexBoundaryMatcher {
    pattern: Regex,
}

impl RegexBoundaryMatcher {
    /// Compile a matcher from a pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("Invalid header pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }
}

impl SectionBoundaryMatcher for RegexBoundaryMatcher {
    fn match_header(&self, line: &str) -> Option<SectionHeader> {
        let line = line.trim();
        let caps = self.pattern.captures(line)?;
        Some(SectionHeader {
            marker: line.to_string(),
            title: caps.name("title").map(|t| t.as_str().trim().to_string()),
        })
    }

    fn name(&self) -> &str {
        "regex"
    }
}
