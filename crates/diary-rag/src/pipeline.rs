//! Query pipeline: embed, search, fetch, generate
//!
//! One question runs as a strictly sequential chain of stages. Every fault,
//! including a panic inside a collaborator, is folded into
//! [`Outcome::Failed`] at this boundary; callers always get an outcome.

use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::is_refusal;
use crate::ingestion::{Chunker, IngestPipeline};
use crate::providers::embedding::check_dimensions;
use crate::providers::{build_embedder, build_generator, build_index, Embedder, Generator, VectorIndex};
use crate::types::{EmptyReason, EntryId, Outcome, QueryOutcome};

/// Probe text embedded by the startup self-check
const PROBE_TEXT: &str = "test";

/// Stages of a single query run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Embedding,
    Searching,
    Fetching,
    Generating,
    Done,
    Errored,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::Embedding => "EMBEDDING",
            QueryStage::Searching => "SEARCHING",
            QueryStage::Fetching => "FETCHING",
            QueryStage::Generating => "GENERATING",
            QueryStage::Done => "DONE",
            QueryStage::Errored => "ERRORED",
        };
        f.write_str(name)
    }
}

/// Retrieval-augmented question answering over one collection
///
/// Collaborators are shared read-only between concurrent queries; all
/// per-query state lives on the stack of [`RagPipeline::run`].
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    ingest: IngestPipeline,
    collection: String,
    top_k: usize,
}

impl RagPipeline {
    /// Create a pipeline with the default diary chunker
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        collection: impl Into<String>,
        top_k: usize,
    ) -> Self {
        let collection = collection.into();
        let ingest = IngestPipeline::new(
            Chunker::default(),
            Arc::clone(&embedder),
            Arc::clone(&index),
            collection.clone(),
            32,
        );

        Self {
            embedder,
            index,
            generator,
            ingest,
            collection,
            top_k: top_k.max(1),
        }
    }

    /// Replace the chunker and embedding batch size used for ingest
    pub fn with_chunker(mut self, chunker: Chunker, batch_size: usize) -> Self {
        self.ingest = IngestPipeline::new(
            chunker,
            Arc::clone(&self.embedder),
            Arc::clone(&self.index),
            self.collection.clone(),
            batch_size,
        );
        self
    }

    /// Build every collaborator from configuration
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let embedder = build_embedder(&config.embeddings).await?;
        let index = build_index(&config.vector_db)?;
        let generator = build_generator(&config.llm)?;
        let chunker = Chunker::from_config(&config.chunking)?;

        Ok(Self::new(
            embedder,
            index,
            generator,
            config.vector_db.collection.clone(),
            config.vector_db.top_k,
        )
        .with_chunker(chunker, config.embeddings.batch_size))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn ingestor(&self) -> &IngestPipeline {
        &self.ingest
    }

    /// Chunk, embed and index a document. Returns the number of entries written.
    pub async fn ingest(&self, text: &str) -> Result<usize> {
        self.ingest.ingest(text).await
    }

    /// Embed a probe text and compare its width against the embedder's
    /// declared dimensions. Returns the width on success.
    pub async fn verify_embedding_dimensions(&self) -> Result<usize> {
        let vector = self.embedder.embed(PROBE_TEXT).await?;
        check_dimensions(&vector, self.embedder.dimensions())?;

        tracing::info!(
            embedder = self.embedder.name(),
            dimensions = vector.len(),
            "Embedding dimensions verified"
        );
        Ok(vector.len())
    }

    /// Answer a question, flattened to the wire shape
    pub async fn query(&self, question: &str) -> QueryOutcome {
        self.run(question).await.into()
    }

    /// Answer a question
    pub async fn run(&self, question: &str) -> Outcome {
        let query_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::info!(%query_id, "Query: \"{}\"", question);

        let outcome = match AssertUnwindSafe(self.execute(query_id, question))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(%query_id, stage = %QueryStage::Errored, "Query failed: {}", e);
                Outcome::Failed {
                    cause: e.to_string(),
                }
            }
            Err(panic) => {
                let e = Error::internal(format!("query panicked: {}", panic_message(&*panic)));
                tracing::error!(%query_id, stage = %QueryStage::Errored, "{}", e);
                Outcome::Failed {
                    cause: e.to_string(),
                }
            }
        };

        tracing::info!(
            %query_id,
            answered = outcome.is_answered(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );

        outcome
    }

    async fn execute(&self, query_id: Uuid, question: &str) -> Result<Outcome> {
        enter(query_id, QueryStage::Embedding);
        let vector = self.embedder.embed(question).await?;

        enter(query_id, QueryStage::Searching);
        let hits = self
            .index
            .search(&self.collection, &vector, self.top_k)
            .await?;
        if hits.is_empty() {
            tracing::info!(%query_id, "No candidates found");
            return Ok(Outcome::Empty {
                reason: EmptyReason::NoMatch,
            });
        }
        let ids: Vec<EntryId> = hits.iter().map(|hit| hit.id).collect();

        enter(query_id, QueryStage::Fetching);
        let entries = self.index.fetch(&self.collection, &ids).await?;

        // Fetch order is backend-defined; present passages in rank order
        let mut texts: HashMap<EntryId, String> = entries
            .into_iter()
            .map(|entry| (entry.id, entry.text))
            .collect();
        let context: Vec<String> = ids.iter().filter_map(|id| texts.remove(id)).collect();

        if context.is_empty() {
            tracing::info!(%query_id, candidates = ids.len(), "Fetch returned no contents");
            return Ok(Outcome::Empty {
                reason: EmptyReason::NoContent,
            });
        }

        enter(query_id, QueryStage::Generating);
        let answer = self.generator.answer(question, &context).await?;
        if is_refusal(&answer) {
            tracing::info!(%query_id, "Passages did not support an answer");
        }

        enter(query_id, QueryStage::Done);
        Ok(Outcome::Answered {
            answer,
            context,
            source_ids: ids.iter().map(|id| id.to_string()).collect(),
        })
    }
}

fn enter(query_id: Uuid, stage: QueryStage) {
    tracing::debug!(%query_id, %stage, "Query stage");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryIndex;
    use crate::testing::{DownEmbedder, EchoGenerator, HashEmbedder, ScriptedIndex};
    use crate::types::{IndexEntry, ScoredId};

    fn scripted(hits: &[EntryId], entries: &[(EntryId, &str)]) -> ScriptedIndex {
        ScriptedIndex {
            hits: hits
                .iter()
                .enumerate()
                .map(|(rank, &id)| ScoredId {
                    id,
                    score: 1.0 - rank as f32 * 0.1,
                })
                .collect(),
            entries: entries
                .iter()
                .map(|&(id, text)| IndexEntry::new(id, vec![0.0; 16], text))
                .collect(),
            ..ScriptedIndex::default()
        }
    }

    fn pipeline(index: ScriptedIndex, generator: Arc<EchoGenerator>) -> RagPipeline {
        RagPipeline::new(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(index),
            generator,
            "diary",
            5,
        )
    }

    #[tokio::test]
    async fn test_no_match_skips_generation() {
        let generator = Arc::new(EchoGenerator::answering("unused"));
        let pipeline = pipeline(scripted(&[], &[]), Arc::clone(&generator));

        let outcome = pipeline.query("Where did we land?").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.answer, "No relevant information found.");
        assert!(outcome.context.is_empty());
        assert!(outcome.source_ids.is_empty());
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_content_skips_generation() {
        let generator = Arc::new(EchoGenerator::answering("unused"));
        let pipeline = pipeline(scripted(&[4, 9], &[]), Arc::clone(&generator));

        let outcome = pipeline.query("Where did we land?").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.answer, "Could not retrieve document contents.");
        assert!(outcome.source_ids.is_empty());
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generator_fault_drops_evidence() {
        let generator = Arc::new(EchoGenerator::failing("rate limited"));
        let pipeline = pipeline(
            scripted(&[2], &[(2, "We arrived today.")]),
            Arc::clone(&generator),
        );

        let outcome = pipeline.query("When did we arrive?").await;
        assert!(!outcome.succeeded);
        assert!(outcome.answer.starts_with("Error: "));
        assert!(outcome.answer.contains("rate limited"));
        assert!(outcome.context.is_empty());
        assert!(outcome.source_ids.is_empty());
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_keeps_rank_order() {
        let generator = Arc::new(EchoGenerator::answering("They arrived and it rained."));
        // Fetch hands entries back in id order, search ranked 7 above 3
        let pipeline = pipeline(
            scripted(&[7, 3], &[(3, "It rained."), (7, "We arrived today.")]),
            Arc::clone(&generator),
        );

        let outcome = pipeline.query("What happened?").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.answer, "They arrived and it rained.");
        assert_eq!(outcome.context, vec!["We arrived today.", "It rained."]);
        assert_eq!(outcome.source_ids, vec!["7", "3"]);

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "What happened?");
        assert_eq!(calls[0].1, outcome.context);
    }

    #[tokio::test]
    async fn test_source_ids_list_every_candidate() {
        let generator = Arc::new(EchoGenerator::answering("ok"));
        let pipeline = pipeline(
            scripted(&[5, 8], &[(8, "Only this one survived.")]),
            generator,
        );

        let outcome = pipeline.query("anything").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.context, vec!["Only this one survived."]);
        assert_eq!(outcome.source_ids, vec!["5", "8"]);
    }

    #[tokio::test]
    async fn test_repeated_queries_are_stable() {
        let generator = Arc::new(EchoGenerator::answering("same"));
        let pipeline = pipeline(scripted(&[1], &[(1, "Entry one.")]), generator);

        let first = pipeline.query("q").await;
        let second = pipeline.query("q").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_embed_fault_is_failed_outcome() {
        let generator = Arc::new(EchoGenerator::answering("unused"));
        let pipeline = RagPipeline::new(
            Arc::new(DownEmbedder),
            Arc::new(scripted(&[1], &[(1, "x")])),
            Arc::clone(&generator) as Arc<dyn Generator>,
            "diary",
            5,
        );

        let outcome = pipeline.run("q").await;
        match outcome {
            Outcome::Failed { cause } => assert!(cause.contains("connection refused")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_fault_is_failed_outcome() {
        let index = ScriptedIndex {
            fail_search: true,
            ..ScriptedIndex::default()
        };
        let pipeline = pipeline(index, Arc::new(EchoGenerator::answering("unused")));

        let outcome = pipeline.query("q").await;
        assert!(!outcome.succeeded);
        assert!(outcome.answer.starts_with("Error: "));
        assert!(outcome.answer.contains("cluster paused"));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let mut index = scripted(&[1], &[(1, "x")]);
        index.panic_on_fetch = true;
        let pipeline = pipeline(index, Arc::new(EchoGenerator::answering("unused")));

        let outcome = pipeline.query("q").await;
        assert!(!outcome.succeeded);
        assert!(outcome.answer.starts_with("Error: "));
        assert!(outcome.answer.contains("fetch exploded"));
    }

    #[tokio::test]
    async fn test_ingest_then_query_end_to_end() {
        let generator = Arc::new(EchoGenerator::answering("It rained."));
        let pipeline = RagPipeline::new(
            Arc::new(HashEmbedder::new(64)),
            Arc::new(InMemoryIndex::new()),
            Arc::clone(&generator) as Arc<dyn Generator>,
            "diary",
            1,
        );

        let text = "1st Day of Snowrest 1856 - Arrival\n\
                    We arrived at the harbour.\n\
                    \n\
                    The weather was rain all afternoon.";
        assert_eq!(pipeline.ingest(text).await.unwrap(), 3);

        let outcome = pipeline.query("weather rain afternoon").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.source_ids, vec!["3"]);
        assert_eq!(outcome.context, vec!["The weather was rain all afternoon."]);
    }

    #[tokio::test]
    async fn test_verify_embedding_dimensions() {
        let generator: Arc<dyn Generator> = Arc::new(EchoGenerator::answering("ok"));
        let ok = RagPipeline::new(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(InMemoryIndex::new()),
            Arc::clone(&generator),
            "diary",
            5,
        );
        assert_eq!(ok.verify_embedding_dimensions().await.unwrap(), 16);

        let wrong = RagPipeline::new(
            Arc::new(HashEmbedder::new(16).reporting_dimensions(384)),
            Arc::new(InMemoryIndex::new()),
            Arc::clone(&generator),
            "diary",
            5,
        );
        assert!(matches!(
            wrong.verify_embedding_dimensions().await,
            Err(Error::DimensionMismatch {
                expected: 384,
                actual: 16
            })
        ));

        let down = RagPipeline::new(
            Arc::new(DownEmbedder),
            Arc::new(InMemoryIndex::new()),
            generator,
            "diary",
            5,
        );
        assert!(matches!(
            down.verify_embedding_dimensions().await,
            Err(Error::ModelUnavailable(_))
        ));
    }
}
