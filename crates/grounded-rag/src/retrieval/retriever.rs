//! Question-to-passages retrieval

use std::sync::Arc;

use super::EmbeddingIndex;
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::types::RetrievalResult;

/// Stateless front for [`EmbeddingIndex::query`] with a configured default `k`
#[derive(Clone)]
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    default_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<EmbeddingIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            default_k: config.top_k,
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Up to `k` passages nearest to `question`, most relevant first
    pub async fn retrieve(
        &self,
        question: &str,
        collection: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        let result = self.index.query(collection, question, k).await?;
        tracing::debug!(
            "Retrieved {} passages from {} (k={})",
            result.len(),
            collection,
            k
        );
        Ok(result)
    }

    /// [`Retriever::retrieve`] with the configured `top_k`
    pub async fn retrieve_default(
        &self,
        question: &str,
        collection: &str,
    ) -> Result<RetrievalResult> {
        self.retrieve(question, collection, self.default_k).await
    }
}
