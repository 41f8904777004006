//! Embedding index and retrieval

pub mod index;
pub mod retriever;

pub use index::EmbeddingIndex;
pub use retriever::Retriever;
