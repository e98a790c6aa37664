//! Generator trait for grounded answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for LLM-based answer generation
///
/// Implementations are prompted to answer only from `context` and to reply
/// with [`crate::generation::REFUSAL_SENTENCE`] when the passages do not
/// support an answer. Backend failures surface as
/// `Error::GenerationUnavailable`, never as a fallback string.
///
/// Implementations:
/// - `ChatCompletionsGenerator`: OpenAI-compatible chat API (Groq)
/// - `OllamaGenerator`: Local Ollama server
#[async_trait]
pub trait Generator: Send + Sync {
    /// Answer `question` from the ordered context passages
    async fn answer(&self, question: &str, context: &[String]) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
