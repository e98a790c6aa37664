//! Configuration for the diary RAG system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file. Missing sections use defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load from an optional file, overlay the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials and the collection name from the environment
    pub fn apply_env(&mut self) {
        if let Some(collection) = env_var("collection_name") {
            self.vector_db.collection = collection;
        }
        if let Some(key) = env_var("ZILLIZ_API_KEY") {
            self.vector_db.api_key = Some(key);
        }
        if let Some(cluster) = env_var("ZILLIZ_CLUSTER_ID") {
            self.vector_db.cluster_id = Some(cluster);
        }
        if let Some(region) = env_var("ZILLIZ_REGION") {
            self.vector_db.region = region;
        }
        if let Some(key) = env_var("GROQ_API_KEY").or_else(|| env_var("groq_key")) {
            self.llm.api_key = Some(key);
        }
    }

    /// Reject configurations that cannot serve a single query
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_unit_size == 0 {
            return Err(Error::config("chunking.max_unit_size must be greater than 0"));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be greater than 0"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than 0"));
        }
        if self.vector_db.top_k == 0 {
            return Err(Error::config("vector_db.top_k must be greater than 0"));
        }
        if self.vector_db.collection.trim().is_empty() {
            return Err(Error::config("vector_db.collection must not be empty"));
        }

        if self.vector_db.backend == VectorBackend::Zilliz {
            if self.vector_db.cluster_id.is_none() && self.vector_db.endpoint.is_none() {
                return Err(Error::config(
                    "Zilliz backend selected but no cluster id is set (ZILLIZ_CLUSTER_ID)",
                ));
            }
            if self.vector_db.api_key.is_none() {
                return Err(Error::config(
                    "Zilliz backend selected but no API key is set (ZILLIZ_API_KEY)",
                ));
            }
        }

        if self.llm.provider == LlmBackend::Groq && self.llm.api_key.is_none() {
            return Err(Error::config(
                "Groq generator selected but no API key is set (GROQ_API_KEY)",
            ));
        }

        Ok(())
    }

    /// Fail unless indexed entries outlive the current process. Commands
    /// that ingest in one invocation and query in another need this.
    pub fn require_persistent_index(&self) -> Result<()> {
        match self.vector_db.backend {
            VectorBackend::Memory => Err(Error::config(
                "vector_db.backend = \"memory\" does not persist between runs; select the zilliz backend",
            )),
            VectorBackend::Zilliz => Ok(()),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embeddings`
    #[default]
    Ollama,
    /// Local ONNX Runtime inference (requires the `onnx` feature)
    Onnx,
}

/// Pooling applied to the transformer's last hidden state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// First token (arctic-embed style)
    #[default]
    Cls,
    /// Attention-masked mean
    Mean,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend used to compute embeddings
    pub provider: EmbeddingBackend,
    /// Model name (Ollama tag, or HuggingFace repo id for ONNX)
    pub model: String,
    /// Ollama base URL
    pub base_url: String,
    /// Embedding dimensions, fixed per deployment
    pub dimensions: usize,
    /// Batch size for embedding generation during ingest
    pub batch_size: usize,
    /// Maximum sequence length (ONNX only)
    pub max_length: usize,
    /// Pooling strategy (ONNX only)
    pub pooling: Pooling,
    /// Cache directory for downloaded models
    pub cache_dir: PathBuf,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: "snowflake-arctic-embed:33m".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 512,
            pooling: Pooling::Cls,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("diary-rag")
                .join("models"),
            timeout_secs: 60,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_unit_size: usize,
    /// Custom section header regex; the diary date header is used when unset
    pub header_pattern: Option<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_unit_size: 800,
            header_pattern: None,
        }
    }
}

/// Generator backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// OpenAI-compatible chat completions (Groq)
    #[default]
    Groq,
    /// Local Ollama `/api/generate`
    Ollama,
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend used for answer generation
    pub provider: LlmBackend,
    /// Chat completions base URL
    pub base_url: String,
    /// Ollama base URL
    pub ollama_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Maximum completion tokens
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests (0 = fail on first error)
    pub max_retries: u32,
    /// API key, read from the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Groq,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.3,
            top_p: 1.0,
            max_tokens: 2000,
            timeout_secs: 120,
            max_retries: 0,
            api_key: None,
        }
    }
}

/// Vector backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// In-process brute-force index
    #[default]
    Memory,
    /// Zilliz Cloud (Milvus REST v2)
    Zilliz,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend holding the entries
    pub backend: VectorBackend,
    /// Collection name threaded through every index call
    pub collection: String,
    /// Number of candidates returned by a search
    pub top_k: usize,
    /// Zilliz serverless cluster id
    pub cluster_id: Option<String>,
    /// Zilliz cloud region
    pub region: String,
    /// Full endpoint override (e.g. self-hosted Milvus `http://localhost:19530/v2`)
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// API key, read from the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            collection: "diary".to_string(),
            top_k: 5,
            cluster_id: None,
            region: "gcp-us-west1".to_string(),
            endpoint: None,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.embeddings.dimensions, 384);
        assert_eq!(config.chunking.max_unit_size, 800);
        assert_eq!(config.vector_db.top_k, 5);
        assert_eq!(config.vector_db.region, "gcp-us-west1");
        assert_eq!(config.llm.model, "llama3-8b-8192");
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.llm.max_retries, 0);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[chunking]
max_unit_size = 400

[vector_db]
collection = "journals"
top_k = 3
"#
        )
        .unwrap();

        let config = RagConfig::from_file(file.path()).unwrap();
        assert_eq!(config.chunking.max_unit_size, 400);
        assert_eq!(config.vector_db.collection, "journals");
        assert_eq!(config.vector_db.top_k, 3);
        // Untouched sections keep their defaults
        assert_eq!(config.embeddings.dimensions, 384);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chunking\nmax_unit_size = ").unwrap();

        let err = RagConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = RagConfig::default();
        config.llm.provider = LlmBackend::Ollama;
        assert!(config.validate().is_ok());

        config.chunking.max_unit_size = 0;
        assert!(config.validate().is_err());

        config.chunking.max_unit_size = 800;
        config.vector_db.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_remote_backends_need_credentials() {
        let mut config = RagConfig::default();
        config.llm.provider = LlmBackend::Ollama;
        config.vector_db.backend = VectorBackend::Zilliz;
        assert!(config.validate().is_err());

        config.vector_db.cluster_id = Some("in03-abc".to_string());
        config.vector_db.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());

        config.llm.provider = LlmBackend::Groq;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_backend_is_not_persistent() {
        let mut config = RagConfig::default();
        assert!(matches!(
            config.require_persistent_index(),
            Err(Error::Config(_))
        ));

        config.vector_db.backend = VectorBackend::Zilliz;
        assert!(config.require_persistent_index().is_ok());
    }

    #[test]
    fn test_api_keys_not_serialized() {
        let mut config = RagConfig::default();
        config.llm.api_key = Some("groq-secret".to_string());
        config.vector_db.api_key = Some("zilliz-secret".to_string());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("groq-secret"));
        assert!(!rendered.contains("zilliz-secret"));
    }
}
