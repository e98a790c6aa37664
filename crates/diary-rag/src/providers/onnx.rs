//! ONNX-based embedding generation
//!
//! Runs a sentence-transformer export (snowflake-arctic-embed-s by default,
//! 384 dimensions) in process. Inference is CPU-bound and runs on the
//! blocking pool.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::{EmbeddingConfig, Pooling};
use crate::error::{Error, Result};

use super::embedding::{check_dimensions, l2_normalize, Embedder};

/// ONNX-based text embedder
pub struct OnnxEmbedder {
    inner: Arc<OnnxInner>,
    model: String,
}

struct OnnxInner {
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Whether the graph takes `token_type_ids`
    uses_token_types: bool,
    dimensions: usize,
    max_length: usize,
    batch_size: usize,
    pooling: Pooling,
}

impl OnnxEmbedder {
    /// Create a new ONNX embedder, downloading model files on first use
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model);

        let repo = model_repo(&config.model);
        let model_dir = config.cache_dir.join(repo.replace('/', "--"));
        std::fs::create_dir_all(&model_dir).map_err(|e| {
            Error::config(format!("Failed to create cache directory: {}", e))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            download_file(&repo, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download_file(&repo, "tokenizer.json", &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::model_unavailable(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::model_unavailable(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::model_unavailable(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::model_unavailable(format!("Failed to load model: {}", e)))?;

        let uses_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::model_unavailable(format!("Failed to load tokenizer: {}", e)))?;

        tracing::info!("ONNX embedder initialized successfully");

        Ok(Self {
            inner: Arc::new(OnnxInner {
                session: Mutex::new(session),
                tokenizer,
                uses_token_types,
                dimensions: config.dimensions,
                max_length: config.max_length,
                batch_size: config.batch_size.max(1),
                pooling: config.pooling,
            }),
            model: repo,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn run_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.embed_all(&texts))
            .await
            .map_err(|e| Error::model_unavailable(format!("Embedding task failed: {}", e)))?
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run_blocking(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::model_unavailable("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run_blocking(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

impl OnnxInner {
    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_batch_internal(batch)?);
        }
        Ok(all_embeddings)
    }

    fn embed_batch_internal(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::model_unavailable(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let shape = vec![batch_size, max_len];
        let mut inputs = vec![
            (
                "input_ids",
                Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
                    .map_err(|e| Error::model_unavailable(format!("Input tensor creation failed: {}", e)))?
                    .into_dyn(),
            ),
            (
                "attention_mask",
                Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
                    .map_err(|e| Error::model_unavailable(format!("Attention mask tensor creation failed: {}", e)))?
                    .into_dyn(),
            ),
        ];
        if self.uses_token_types {
            inputs.push((
                "token_type_ids",
                Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                    .map_err(|e| Error::model_unavailable(format!("Token type tensor creation failed: {}", e)))?
                    .into_dyn(),
            ));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::model_unavailable(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::model_unavailable("No output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::model_unavailable(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims.get(2).copied().unwrap_or(self.dimensions);

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = match self.pooling {
                Pooling::Cls => {
                    let start = i * max_len * hidden_size;
                    tensor_data[start..start + hidden_size].to_vec()
                }
                Pooling::Mean => mean_pool(
                    tensor_data,
                    &attention_mask[i * max_len..(i + 1) * max_len],
                    i * max_len * hidden_size,
                    hidden_size,
                ),
            };

            check_dimensions(&pooled, self.dimensions)?;
            l2_normalize(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

/// Attention-masked mean over one sequence of the hidden state
fn mean_pool(data: &[f32], mask: &[i64], offset: usize, hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (j, &m) in mask.iter().enumerate() {
        if m > 0 {
            let row = offset + j * hidden_size;
            for k in 0..hidden_size {
                sum[k] += data[row + k];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }
    sum
}

/// Bare model names resolve to the sentence-transformers organisation
fn model_repo(model: &str) -> String {
    if model.contains('/') {
        model.to_string()
    } else {
        format!("sentence-transformers/{}", model)
    }
}

/// Download a file from a HuggingFace model repository
async fn download_file(repo: &str, file: &str, path: &Path) -> Result<()> {
    let url = format!("https://huggingface.co/{}/resolve/main/{}", repo, file);

    tracing::info!("Downloading {} from: {}", file, url);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::model_unavailable(format!("Failed to download {}: {}", file, e)))?;

    if !response.status().is_success() {
        return Err(Error::model_unavailable(format!(
            "Download of {} failed: HTTP {}",
            file,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::model_unavailable(format!("Failed to read {} bytes: {}", file, e)))?;

    let tmp: PathBuf = path.with_extension("part");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;

    tracing::info!("Downloaded {} ({} bytes)", file, bytes.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_repo() {
        assert_eq!(
            model_repo("Snowflake/snowflake-arctic-embed-s"),
            "Snowflake/snowflake-arctic-embed-s"
        );
        assert_eq!(
            model_repo("all-MiniLM-L6-v2"),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        // batch of one, 3 tokens, hidden size 2, last token is padding
        let data = [1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let pooled = mean_pool(&data, &[1, 1, 0], 0, 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }
}
