//! Provider abstractions for embeddings, vector search and answer generation
//!
//! Concrete backends are chosen from configuration once at start-up and
//! shared read-only across requests.

pub mod chat;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod ollama;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod vector_index;
pub mod zilliz;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmBackend, LlmConfig, VectorBackend, VectorDbConfig};
use crate::error::Result;

pub use chat::ChatCompletionsGenerator;
pub use embedding::Embedder;
pub use llm::Generator;
pub use memory::InMemoryIndex;
pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use vector_index::VectorIndex;
pub use zilliz::{CollectionStats, ZillizIndex};

/// Build the configured embedder
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingBackend::Ollama => {
            tracing::info!("Using Ollama embeddings ({} at {})", config.model, config.base_url);
            Ok(Arc::new(OllamaEmbedder::new(config)?))
        }
        EmbeddingBackend::Onnx => {
            #[cfg(feature = "onnx")]
            {
                Ok(Arc::new(onnx::OnnxEmbedder::new(config).await?))
            }
            #[cfg(not(feature = "onnx"))]
            {
                Err(crate::error::Error::config(
                    "ONNX embeddings selected but the onnx feature is not enabled. \
                     Rebuild with --features onnx",
                ))
            }
        }
    }
}

/// Build the configured vector index
pub fn build_index(config: &VectorDbConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend {
        VectorBackend::Memory => {
            tracing::info!("Using in-memory vector index");
            Ok(Arc::new(InMemoryIndex::new()))
        }
        VectorBackend::Zilliz => {
            let index = ZillizIndex::new(config)?;
            tracing::info!("Using Zilliz vector index at {}", index.base_url());
            Ok(Arc::new(index))
        }
    }
}

/// Build the configured generator
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider {
        LlmBackend::Groq => {
            tracing::info!("Using chat completions generator ({} at {})", config.model, config.base_url);
            Ok(Arc::new(ChatCompletionsGenerator::new(config)?))
        }
        LlmBackend::Ollama => {
            tracing::info!("Using Ollama generator ({} at {})", config.model, config.ollama_url);
            Ok(Arc::new(OllamaGenerator::new(config)?))
        }
    }
}
