//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::SegmentMode;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "GROUNDED_RAG_CONFIG";

/// Main RAG configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Segmentation configuration
    pub segmentation: SegmentationConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Generation parameters sent with every request
    pub generation: GenerationConfig,
    /// Outbound HTTP settings
    pub http: HttpConfig,
    /// watsonx.ai endpoint details (credentials come from the environment)
    pub watsonx: WatsonxConfig,
}

impl RagConfig {
    /// Parse a TOML document; absent sections and fields fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Configuration(format!("Invalid config: {}", e)))
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load from `$GROUNDED_RAG_CONFIG` if set, otherwise defaults
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
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
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Sentence-transformer model through ONNX Runtime
    #[default]
    Onnx,
    /// Lexical feature hashing, no model download
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend
    pub backend: EmbeddingBackend,
    /// Model to use (default: all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Cache directory for models
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 32,
            max_length: 256,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("grounded-rag")
                .join("models"),
        }
    }
}

/// Segmentation configuration, applied the same way to every source kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Unit granularity
    pub mode: SegmentMode,
    /// Target chunk size in characters (chunk mode only)
    pub chunk_size: usize,
    /// Overlap between chunks in characters (chunk mode only)
    pub chunk_overlap: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            mode: SegmentMode::Sentence,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages handed to the prompt builder
    pub top_k: usize,
    /// Drop units left over from a previous, longer ingestion of the same source
    pub prune_stale_units: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            prune_stale_units: true,
        }
    }
}

/// Decoding strategy understood by watsonx.ai
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    #[default]
    Greedy,
    Sample,
}

/// Generation parameters; built once and never mutated afterwards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub decoding_method: DecodingMethod,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "meta-llama/llama-2-70b-chat".to_string(),
            max_new_tokens: 100,
            min_new_tokens: 50,
            decoding_method: DecodingMethod::Greedy,
            temperature: 0.7,
            top_k: 50,
            top_p: 1.0,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for fetching a web page
    pub fetch_timeout_secs: u64,
    /// Timeout for one generation request (including token exchange)
    pub generation_timeout_secs: u64,
    /// User agent sent when fetching pages
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            generation_timeout_secs: 120,
            user_agent: concat!("grounded-rag/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// watsonx.ai endpoint details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatsonxConfig {
    /// `version` query parameter of the text generation API
    pub api_version: String,
    /// IBM Cloud IAM token endpoint
    pub iam_url: String,
}

impl Default for WatsonxConfig {
    fn default() -> Self {
        Self {
            api_version: "2023-05-29".to_string(),
            iam_url: "https://iam.cloud.ibm.com/identity/token".to_string(),
        }
    }
}

/// Process-wide credentials for the hosted model
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    project_id: String,
    endpoint_url: String,
}

impl Credentials {
    /// Build credentials; every field must be non-empty
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> Result<Self> {
        let creds = Self {
            api_key: api_key.into().trim().to_string(),
            project_id: project_id.into().trim().to_string(),
            endpoint_url: endpoint_url.into().trim().trim_end_matches('/').to_string(),
        };

        for (name, value) in [
            ("api_key", &creds.api_key),
            ("project_id", &creds.project_id),
            ("endpoint_url", &creds.endpoint_url),
        ] {
            if value.is_empty() {
                return Err(Error::Configuration(format!("Credential '{}' is empty", name)));
            }
        }

        Ok(creds)
    }

    /// Read credentials from the process environment.
    ///
    /// `WATSONX_API_KEY`, `WATSONX_PROJECT_ID` and `WATSONX_URL` win over the
    /// lower-case `api_key`, `project_id` and `url` names used by `.env` files.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |primary: &str, fallback: &str| -> Result<String> {
            lookup(primary)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(fallback).filter(|v| !v.trim().is_empty()))
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "Missing credential: set {} (or {})",
                        primary, fallback
                    ))
                })
        };

        Self::new(
            read("WATSONX_API_KEY", "api_key")?,
            read("WATSONX_PROJECT_ID", "project_id")?,
            read("WATSONX_URL", "url")?,
        )
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Endpoint without a trailing slash
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}
