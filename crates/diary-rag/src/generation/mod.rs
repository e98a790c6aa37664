//! Answer generation clients and prompt templates

pub mod chat;
pub mod ollama;
pub mod prompt;
mod retry;

pub use chat::ChatCompletionsClient;
pub use ollama::OllamaClient;
pub use prompt::{is_refusal, PromptBuilder, REFUSAL_SENTENCE};
pub(crate) use retry::retry_request;
