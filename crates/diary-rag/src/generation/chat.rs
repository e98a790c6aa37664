//! OpenAI-compatible chat completions client (Groq by default)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::prompt::PromptBuilder;
use super::retry_request;

/// Chat completions client
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: String,
    config: LlmConfig,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatCompletionsClient {
    /// Create a new client. Requires `config.api_key`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("Chat completions API key is not set (GROQ_API_KEY)"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Messages for a grounded answer
    pub fn answer_messages(question: &str, context: &[String]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(PromptBuilder::system_prompt(context)),
            ChatMessage::system(PromptBuilder::refusal_instruction()),
            ChatMessage::user(PromptBuilder::user_prompt(question)),
        ]
    }

    /// Check if the API answers the models listing
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Run a chat completion and return the first choice, trimmed
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        retry_request(self.config.max_retries, || {
            let client = self.client.clone();
            let url = url.clone();
            let body = serde_json::to_value(ChatRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
                max_completion_tokens: self.config.max_tokens,
                top_p: self.config.top_p,
                stream: false,
            });

            async move {
                let body = body?;
                let response = client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| {
                        Error::generation_unavailable(format!("Chat request failed: {}", e))
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::generation_unavailable(format!(
                        "Chat completion failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let parsed: ChatResponse = response.json().await.map_err(|e| {
                    Error::generation_unavailable(format!("Failed to parse chat response: {}", e))
                })?;

                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content.trim().to_string())
                    .ok_or_else(|| Error::generation_unavailable("Chat response had no choices"))
            }
        })
        .await
    }

    /// Generate a grounded answer from ordered context passages
    pub async fn generate_answer(&self, question: &str, context: &[String]) -> Result<String> {
        self.complete(&Self::answer_messages(question, context)).await
    }
}
