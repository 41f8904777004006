//! Answer generation with a hosted language model

pub mod prompt;
pub mod watsonx;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::Result;

pub use prompt::{PromptBuilder, UNANSWERABLE};
pub use watsonx::WatsonxClient;

/// Sends a finished prompt to a model and returns its trimmed answer.
///
/// Credentials are bound when the client is constructed.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
