//! Response types for retrieval, ingestion and answering

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::prompt::UNANSWERABLE;
use crate::types::SourceKind;

/// One retrieved passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedUnit {
    /// Unit id within the collection
    pub id: String,
    /// Passage text
    pub text: String,
    /// Cosine similarity to the question (higher is more relevant)
    pub score: f32,
    /// Cosine distance, `1 - score`
    pub distance: f32,
}

/// Passages ordered nearest-first, at most k long
pub type RetrievalResult = Vec<RetrievedUnit>;

/// State of a collection after an ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    /// Units stored after the write
    pub units: usize,
    /// Embedding dimensionality (None until the first upsert)
    pub dimensions: Option<usize>,
}

/// Result of ingesting one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub collection: String,
    pub source: String,
    pub kind: SourceKind,
    /// Units produced by the segmenter
    pub units_ingested: usize,
    /// Units in the collection after the write
    pub collection_size: usize,
    pub ingested_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Answer to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Model answer, trimmed
    pub answer: String,
    /// False when the model replied with the refusal token
    pub answerable: bool,
    pub collection: String,
    /// Passages the prompt was built from
    pub sources: Vec<RetrievedUnit>,
    pub processing_time_ms: u64,
}

impl QueryResponse {
    pub fn new(
        answer: String,
        collection: impl Into<String>,
        sources: Vec<RetrievedUnit>,
        processing_time_ms: u64,
    ) -> Self {
        let answerable = !is_refusal(&answer);
        Self {
            answer,
            answerable,
            collection: collection.into(),
            sources,
            processing_time_ms,
        }
    }
}

/// Whether a model answer is the refusal token, tolerating quotes and a trailing period
pub fn is_refusal(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .eq_ignore_ascii_case(UNANSWERABLE)
}
