//! Result set to natural-language answer.

use crate::llm::client::{CompletionProvider, CompletionRequest};
use crate::llm::prompt::summary_prompt;
use crate::types::{AskError, GenerationPhase, Result, ResultRow, SqlStatement};
use std::sync::Arc;

/// Output cap for the answer completion.
pub const SUMMARY_MAX_TOKENS: u32 = 800;

/// Moderate temperature for natural phrasing.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Answer returned when the model produces no text.
pub const FALLBACK_ANSWER: &str = "Unable to generate response";

/// Second model call of a pipeline run.
pub struct ResponseSynthesizer {
    provider: Arc<dyn CompletionProvider>,
}

impl ResponseSynthesizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Summarize `rows` as an answer to `question`.
    ///
    /// # Returns
    ///
    /// Trimmed completion text, or [`FALLBACK_ANSWER`] if it was empty
    ///
    /// # Errors
    ///
    /// Returns `AskError::Generation` tagged `summarization` if the provider fails
    pub async fn respond(
        &self,
        question: &str,
        statement: &SqlStatement,
        rows: &[ResultRow],
    ) -> Result<String> {
        let request = CompletionRequest::new(
            summary_prompt(question, statement, rows),
            SUMMARY_MAX_TOKENS,
            SUMMARY_TEMPERATURE,
        );

        let text = self.provider.complete(&request).await.map_err(|e| {
            AskError::generation(
                GenerationPhase::Summarization,
                format!("Failed to generate response: {}", e),
            )
        })?;

        let text = text.trim();
        if text.is_empty() {
            tracing::warn!("Empty answer completion, using fallback");
            return Ok(FALLBACK_ANSWER.to_string());
        }

        Ok(text.to_string())
    }
}
