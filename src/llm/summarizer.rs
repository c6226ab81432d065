//! Summarizer trait and the fixed newsletter instruction.

use async_trait::async_trait;

use crate::error::LlmError;

/// System instruction sent with every summarization request.
///
/// The length target is advisory; the output is returned verbatim.
pub const SUMMARY_INSTRUCTION: &str = "You summarize email newsletters for a chat channel. \
Write plain text in three short labeled paragraphs:\n\
Topic: introduce what the newsletter is about.\n\
Viewpoints: lay out the main opposing viewpoints it presents.\n\
My take: give a brief personal take on the issue.\n\
Keep the whole summary under 1000 characters.";

/// Turns normalized newsletter text into a summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Send one request and return the generated text unchanged.
    async fn summarize(&self, text: &str) -> Result<String, LlmError>;
}
