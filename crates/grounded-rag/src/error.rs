//! Error types for the RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a request was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Extracting,
    Segmenting,
    Indexing,
    Retrieving,
    Prompting,
    Generating,
    Done,
}

impl PipelineStage {
    /// Stage that follows this one in a successful run
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Extracting,
            Self::Extracting => Self::Segmenting,
            Self::Segmenting => Self::Indexing,
            Self::Indexing => Self::Retrieving,
            Self::Retrieving => Self::Prompting,
            Self::Prompting => Self::Generating,
            Self::Generating | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Segmenting => "segmenting",
            Self::Indexing => "indexing",
            Self::Retrieving => "retrieving",
            Self::Prompting => "prompting",
            Self::Generating => "generating",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a call to the hosted model failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Credentials rejected (token exchange or generation returned 401/403)
    Authentication(String),
    /// Quota exhausted or rate limited (HTTP 429)
    RateLimited(String),
    /// Response did not carry `results[0].generated_text`
    MalformedResponse(String),
    /// Any other non-success status
    Upstream { status: u16, body: String },
    /// Connection, TLS or timeout failure
    Transport(String),
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication(msg) => write!(f, "authentication failed: {}", msg),
            Self::RateLimited(msg) => write!(f, "rate limited: {}", msg),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            Self::Upstream { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration / credentials
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source could not be turned into text
    #[error("Failed to extract text from '{source_name}': {message}")]
    Extraction { source_name: String, message: String },

    /// Web page fetch returned a non-success status
    #[error("Failed to fetch page: HTTP {status_code}")]
    Fetch { status_code: u16 },

    /// Query against a missing or empty collection
    #[error("Collection '{0}' is empty or does not exist")]
    EmptyCollection(String),

    /// Hosted model call failed
    #[error("Generation failed: {cause}")]
    Generation { cause: GenerationFailure },

    /// Malformed request (bad collection name, missing upload)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Declared source kind is not supported
    #[error("Unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Index invariant violated (dimension mismatch, bad id)
    #[error("Index error: {0}")]
    Index(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error outside of generation
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// A pipeline run failed in `stage`
    #[error("Pipeline failed while {stage}: {source}")]
    Pipeline {
        stage: PipelineStage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an extraction error
    pub fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a generation error
    pub fn generation(cause: GenerationFailure) -> Self {
        Self::Generation { cause }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach the failing stage; already-staged errors keep their original stage
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            Self::Pipeline { .. } => self,
            other => Self::Pipeline {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if it came out of a pipeline run
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Underlying error with pipeline context removed
    pub fn root(&self) -> &Error {
        match self {
            Self::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let stage = self.stage();
        let (status, error_type, message) = match self.root() {
            Error::Configuration(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone())
            }
            err @ Error::Extraction { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
                err.to_string(),
            ),
            Error::Fetch { status_code } => (
                StatusCode::BAD_GATEWAY,
                "fetch_error",
                format!("Upstream page returned HTTP {}", status_code),
            ),
            Error::EmptyCollection(name) => (
                StatusCode::NOT_FOUND,
                "empty_collection",
                format!("Collection '{}' is empty or does not exist", name),
            ),
            Error::Generation { cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "generation_error",
                cause.to_string(),
            ),
            Error::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            Error::UnsupportedSourceKind(kind) => (
                StatusCode::BAD_REQUEST,
                "unsupported_type",
                format!("Unsupported source kind: {}", kind),
            ),
            Error::Embedding(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error", msg.clone())
            }
            Error::Index(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error", msg.clone()),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
            // root() never yields a Pipeline wrapper
            err @ Error::Pipeline { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "stage": stage.map(|s| s.as_str()),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
