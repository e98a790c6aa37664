//! Ollama-based providers for embeddings and answer generation
//!
//! Wraps the shared OllamaClient to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::Result;
use crate::generation::ollama::SamplingOptions;
use crate::generation::OllamaClient;

use super::embedding::{check_dimensions, l2_normalize, Embedder};
use super::llm::Generator;

/// Ollama embedding provider using snowflake-arctic-embed or similar models
///
/// Vectors are L2-normalized client-side so that dot product equals cosine
/// similarity regardless of the model's own output scale.
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder. Embedding calls are never retried.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, config.timeout_secs, 0)?;
        Ok(Self::from_client(
            Arc::new(client),
            config.dimensions,
            config.model.clone(),
        ))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize, model: String) -> Self {
        Self {
            client,
            dimensions,
            model,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = self.client.embed(&self.model, text).await?;
        check_dimensions(&vector, self.dimensions)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama generator for grounded answers
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
    model: String,
    options: SamplingOptions,
}

impl OllamaGenerator {
    /// Create a new Ollama generator
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.ollama_url, config.timeout_secs, config.max_retries)?;
        Ok(Self {
            client: Arc::new(client),
            model: config.model.clone(),
            options: SamplingOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_tokens,
            },
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Arc<OllamaClient> {
        &self.client
    }

    /// Raw completion, used for grading
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.model, prompt, self.options).await
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        self.client
            .generate_answer(&self.model, question, context, self.options)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
