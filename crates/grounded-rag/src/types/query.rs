//! Request types

use serde::{Deserialize, Serialize};

/// Question against a single collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,
    /// Collection to retrieve from
    pub collection: String,
    /// Number of passages to retrieve (defaults to the configured top_k)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            collection: collection.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Ingest a web page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestUrlRequest {
    pub url: String,
    /// Explicit collection name; derived from the URL when absent
    #[serde(default)]
    pub collection: Option<String>,
}
