//! Deterministic in-process collaborators for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::providers::embedding::l2_normalize;
use crate::providers::{Embedder, Generator, VectorIndex};
use crate::types::{EntryId, IndexEntry, RetrievalResult};

/// Bag-of-words hashing embedder. Texts sharing words land close together.
pub struct HashEmbedder {
    dimensions: usize,
    reported: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            reported: dimensions,
        }
    }

    /// Claim a width other than the one actually produced
    pub fn reporting_dimensions(mut self, reported: usize) -> Self {
        self.reported = reported;
        self
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % self.dimensions as u64) as usize] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.reported
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Embedder whose backend is down
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::model_unavailable("connection refused"))
    }

    fn dimensions(&self) -> usize {
        16
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Index with canned search and fetch results
#[derive(Default)]
pub struct ScriptedIndex {
    pub hits: RetrievalResult,
    pub entries: Vec<IndexEntry>,
    pub fail_search: bool,
    pub panic_on_fetch: bool,
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn insert(&self, _collection: &str, _entries: &[IndexEntry]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult> {
        if self.fail_search {
            return Err(Error::retrieval_unavailable("cluster paused"));
        }
        Ok(self.hits.iter().take(top_k).copied().collect())
    }

    async fn fetch(&self, _collection: &str, ids: &[EntryId]) -> Result<Vec<IndexEntry>> {
        if self.panic_on_fetch {
            panic!("fetch exploded");
        }
        Ok(self
            .entries
            .iter()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Generator that records its calls and replies with a fixed answer
pub struct EchoGenerator {
    reply: std::result::Result<String, String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl EchoGenerator {
    pub fn answering(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            reply: Err(cause.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        self.calls
            .lock()
            .push((question.to_string(), context.to_vec()));
        self.reply
            .clone()
            .map_err(Error::generation_unavailable)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_ok())
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-1"
    }
}
