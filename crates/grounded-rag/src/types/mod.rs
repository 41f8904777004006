//! Core types for the RAG pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{Document, DocumentSource, NormalizedText, SourceKind, Unit};
pub use query::{IngestUrlRequest, QueryRequest};
pub use response::{
    CollectionSummary, IngestResponse, QueryResponse, RetrievalResult, RetrievedUnit,
};
