//! grounded-rag: single-document retrieval-augmented question answering
//!
//! Extracts text from a PDF, a plain-text file or a web page, segments it into
//! units, indexes them by sentence embedding, retrieves the passages nearest to a
//! question and asks a hosted model (IBM watsonx.ai) to answer from those passages
//! only, replying "unanswerable" when they do not contain the answer.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::{Credentials, RagConfig};
pub use error::{Error, PipelineStage, Result};
pub use pipeline::RagPipeline;
pub use types::{
    Document, DocumentSource, QueryRequest, QueryResponse, RetrievedUnit, SourceKind, Unit,
};
