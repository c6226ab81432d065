//! Bridges a rig `CompletionModel` to the `Summarizer` trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use super::summarizer::{SUMMARY_INSTRUCTION, Summarizer};
use crate::error::LlmError;

/// Summarizer over any rig completion model.
pub struct RigSummarizer<M> {
    model: M,
    provider: String,
    model_name: String,
    max_tokens: u64,
}

impl<M: CompletionModel> RigSummarizer<M> {
    pub fn new(model: M, provider: &str, model_name: &str, max_tokens: u64) -> Self {
        Self {
            model,
            provider: provider.to_string(),
            model_name: model_name.to_string(),
            max_tokens,
        }
    }
}

#[async_trait]
impl<M> Summarizer for RigSummarizer<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        let agent = AgentBuilder::new(self.model.clone())
            .preamble(SUMMARY_INSTRUCTION)
            .max_tokens(self.max_tokens)
            .build();

        tracing::debug!(
            provider = %self.provider,
            model = %self.model_name,
            input_chars = text.chars().count(),
            "Requesting summary"
        );

        agent
            .prompt(text.to_string())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: e.to_string(),
            })
    }
}
