//! Final Interpretation
//!
//! One-shot interpretive text built from already compressed state. Nothing here
//! writes dialogue state, and unlike summarization a failed generation call is
//! returned to the caller: there is no useful fallback for an interpretation
//! the user explicitly asked for.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::dialogue::ConversationKey;
use crate::llm::{ChatMessage, GenerationError, GenerationRequest, TextGenerator};
use crate::storage::{Storage, StorageError};

const BLOCK_PROMPT: &str = "You are a thoughtful dream interpreter. Given one passage of a \
dream and a summary of the dreamer's reflections on it, write a single interpretation of the \
passage. Draw on the symbols and feelings the dreamer described. Do not ask questions and do \
not invite further conversation. Plain prose, at most three paragraphs.";

const DREAM_PROMPT: &str = "You are a thoughtful dream interpreter. Given a whole dream and \
summaries of the dreamer's reflections on each of its parts, write one interpretation of the \
dream as a whole. Focus on motifs and emotions that recur across parts and how they develop. \
Do not ask questions. Plain prose, at most four paragraphs.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpretationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum InterpretationError {
    #[error("Interpretation failed: {0}")]
    Upstream(#[from] GenerationError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct InterpretationPipeline {
    generator: Arc<dyn TextGenerator>,
    config: InterpretationConfig,
}

impl InterpretationPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_config(generator, InterpretationConfig::default())
    }

    pub fn with_config(generator: Arc<dyn TextGenerator>, config: InterpretationConfig) -> Self {
        Self { generator, config }
    }

    /// Interpret one block from its text and rolling summary
    #[instrument(skip_all)]
    pub async fn interpret_block(
        &self,
        block_text: &str,
        block_summary: Option<&str>,
    ) -> Result<String, InterpretationError> {
        let mut body = format!("Dream passage:\n{}\n\n", block_text.trim());
        match block_summary.map(str::trim).filter(|s| !s.is_empty()) {
            Some(summary) => {
                body.push_str("What the dreamer said about it:\n");
                body.push_str(summary);
            }
            None => body.push_str("The dreamer has not discussed this passage."),
        }

        let text = self.generate(BLOCK_PROMPT, body).await?;
        info!(chars = text.len(), "Block interpretation generated");
        Ok(text)
    }

    /// Interpret a whole dream across the summaries of all its blocks
    #[instrument(skip_all, fields(blocks = block_summaries.len()))]
    pub async fn interpret_dream(
        &self,
        dream_text: &str,
        block_summaries: &[String],
    ) -> Result<String, InterpretationError> {
        let mut body = format!("The dream:\n{}\n\n", dream_text.trim());

        let summaries: Vec<&str> = block_summaries
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if summaries.is_empty() {
            body.push_str("No part of the dream has been discussed yet.");
        } else {
            body.push_str("Reflections on each part:\n");
            for (i, summary) in summaries.iter().enumerate() {
                body.push_str(&format!("Part {}: {}\n", i + 1, summary));
            }
        }

        let text = self.generate(DREAM_PROMPT, body).await?;
        info!(chars = text.len(), "Dream interpretation generated");
        Ok(text)
    }

    /// [`interpret_block`](Self::interpret_block) with the stored summary of `key`
    pub async fn interpret_block_from_store(
        &self,
        storage: &Storage,
        key: &ConversationKey,
        block_text: &str,
    ) -> Result<String, InterpretationError> {
        let summary = storage.get_summary(key)?;
        self.interpret_block(block_text, summary.as_ref().map(|s| s.summary_text.as_str()))
            .await
    }

    /// [`interpret_dream`](Self::interpret_dream) with every stored block summary of `dream_id`
    pub async fn interpret_dream_from_store(
        &self,
        storage: &Storage,
        dream_id: &str,
        dream_text: &str,
    ) -> Result<String, InterpretationError> {
        let summaries: Vec<String> = storage
            .list_dream_summaries(dream_id)?
            .into_iter()
            .map(|s| s.summary_text)
            .collect();
        self.interpret_dream(dream_text, &summaries).await
    }

    async fn generate(&self, system: &str, body: String) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(
            vec![ChatMessage::system(system), ChatMessage::user(body)],
            self.config.max_tokens,
            self.config.temperature,
        );
        self.generator.generate(request).await
    }
}
