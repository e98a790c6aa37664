//! Chat completions generator (Groq)

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::generation::ChatCompletionsClient;

use super::llm::Generator;

/// Generator backed by an OpenAI-compatible chat completions API
pub struct ChatCompletionsGenerator {
    client: ChatCompletionsClient,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: ChatCompletionsClient::new(config)?,
        })
    }

    pub fn client(&self) -> &ChatCompletionsClient {
        &self.client
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        self.client.generate_answer(question, context).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "chat-completions"
    }

    fn model(&self) -> &str {
        self.client.model()
    }
}
