//! Text embedding providers

pub mod hashing;
pub mod onnx_embedder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;

pub use hashing::HashingEmbedder;
pub use onnx_embedder::{LazyOnnxEmbedder, OnnxEmbedder};

/// Trait for generating text embeddings.
///
/// Implementations must be deterministic: the same text always yields the same vector.
///
/// Implementations:
/// - `LazyOnnxEmbedder`: all-MiniLM-L6-v2 through ONNX Runtime, loaded on first use
/// - `HashingEmbedder`: lexical feature hashing, no model files
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::Error::embedding("Empty embedding result"))
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Shared handle passed to the index
pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;

/// Build the configured embedding provider
pub fn from_config(config: &EmbeddingConfig) -> SharedEmbedder {
    match config.backend {
        EmbeddingBackend::Onnx => Arc::new(LazyOnnxEmbedder::new(config.clone())),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.dimensions)),
    }
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Scale a vector to unit length in place
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_from_config_respects_backend() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Hashing,
            dimensions: 64,
            ..Default::default()
        };
        let embedder = from_config(&config);
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.dimensions(), 64);
    }
}
