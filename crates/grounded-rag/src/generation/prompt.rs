//! Grounding prompt construction

use crate::types::RetrievedUnit;

/// Literal the model is told to reply with when the context cannot answer the question
pub const UNANSWERABLE: &str = "unanswerable";

/// Separator between retrieved passages
pub const CONTEXT_SEPARATOR: &str = "\n\n\n";

/// Prompt builder for grounded question answering
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the prompt from passage texts (nearest first) and the question.
    ///
    /// Pure: the same inputs always produce the same string.
    pub fn build_prompt<S: AsRef<str>>(retrieved_texts: &[S], question: &str) -> String {
        let context = retrieved_texts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        format!(
            "{context}\n\n{instructions} Question: {question}",
            context = context,
            instructions = Self::instructions(),
            question = question
        )
    }

    /// Build the prompt straight from retrieval results
    pub fn from_results(results: &[RetrievedUnit], question: &str) -> String {
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        Self::build_prompt(&texts, question)
    }

    fn instructions() -> String {
        format!(
            "Please answer the following question in one sentence using this text. \
             If the question is unanswerable, say \"{}\". \
             Do not include information that's not relevant to the question.",
            UNANSWERABLE
        )
    }
}
