//! Ollama HTTP client for embeddings and answer generation

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

use super::prompt::PromptBuilder;
use super::retry_request;

/// Ollama API client with optional retry
#[derive(Clone)]
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Maximum retries (0 = fail on first error)
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Sampling parameters for `/api/generate`
#[derive(Debug, Clone, Copy)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate a raw (not normalized) embedding
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        retry_request(self.max_retries, || {
            let request = EmbedRequest {
                model: model.to_string(),
                prompt: text.to_string(),
            };
            let client = self.client.clone();
            let url = url.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::model_unavailable(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(Error::model_unavailable(format!(
                        "Embedding failed: HTTP {}",
                        response.status()
                    )));
                }

                let body: EmbedResponse = response.json().await.map_err(|e| {
                    Error::model_unavailable(format!("Failed to parse embedding response: {}", e))
                })?;

                if body.embedding.is_empty() {
                    return Err(Error::model_unavailable(format!(
                        "Model '{}' returned an empty embedding",
                        request.model
                    )));
                }

                Ok(body.embedding)
            }
        })
        .await
    }

    /// Generate text for a prompt
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: SamplingOptions,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        retry_request(self.max_retries, || {
            let request = GenerateRequest {
                model: model.to_string(),
                prompt: prompt.to_string(),
                stream: false,
                options: GenerateOptions {
                    temperature: options.temperature,
                    top_p: options.top_p,
                    num_predict: options.max_tokens,
                },
            };
            let client = self.client.clone();
            let url = url.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| {
                        Error::generation_unavailable(format!("Generate request failed: {}", e))
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::generation_unavailable(format!(
                        "Generation failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let body: GenerateResponse = response.json().await.map_err(|e| {
                    Error::generation_unavailable(format!("Failed to parse response: {}", e))
                })?;

                Ok(body.response.trim().to_string())
            }
        })
        .await
    }

    /// Generate a grounded answer from ordered context passages
    pub async fn generate_answer(
        &self,
        model: &str,
        question: &str,
        context: &[String],
        options: SamplingOptions,
    ) -> Result<String> {
        let prompt = PromptBuilder::build_rag_prompt(question, context);
        self.generate(model, &prompt, options).await
    }
}
