//! Conversation Turns
//!
//! One dialogue turn about a dream block: store the dreamer's message, bring
//! the rolling summary up to date, answer from the summary plus the last few
//! raw turns, and store the answer.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::dialogue::{ConversationKey, Message, Role};
use crate::llm::{ChatMessage, GenerationError, GenerationRequest, TextGenerator};
use crate::storage::{Storage, StorageError};
use crate::summary::{RefreshOutcome, SummaryEngine, SummaryError};

const PERSONA: &str = "You are a warm, curious dream guide. You help the dreamer explore one \
passage of their dream by asking about images, feelings and associations. Keep replies short, \
reflect back what you heard, and ask at most one question at a time. Do not deliver a final \
interpretation.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversationConfig {
    /// Raw turns sent alongside the summary
    pub recent_turns: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            recent_turns: 8,
            max_tokens: 600,
            temperature: 0.8,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Reply generation failed: {0}")]
    Upstream(#[from] GenerationError),
}

impl From<SummaryError> for ConversationError {
    fn from(e: SummaryError) -> Self {
        match e {
            SummaryError::Storage(e) => ConversationError::Storage(e),
        }
    }
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub user_message: Message,
    pub reply: Message,
    pub summary: RefreshOutcome,
}

/// Serializable view of a turn for transport layers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnView<'a> {
    pub user_message: &'a Message,
    pub reply: &'a Message,
    pub summary: Option<&'a str>,
    pub summary_status: &'static str,
    pub last_processed_count: u64,
}

impl TurnReply {
    pub fn view(&self) -> TurnView<'_> {
        TurnView {
            user_message: &self.user_message,
            reply: &self.reply,
            summary: self.summary.summary_text(),
            summary_status: self.summary.status(),
            last_processed_count: self.summary.last_processed_count(),
        }
    }
}

pub struct ConversationService {
    storage: Arc<Storage>,
    summaries: Arc<SummaryEngine>,
    generator: Arc<dyn TextGenerator>,
    config: ConversationConfig,
}

impl ConversationService {
    pub fn new(
        storage: Arc<Storage>,
        summaries: Arc<SummaryEngine>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::with_config(storage, summaries, generator, ConversationConfig::default())
    }

    pub fn with_config(
        storage: Arc<Storage>,
        summaries: Arc<SummaryEngine>,
        generator: Arc<dyn TextGenerator>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            storage,
            summaries,
            generator,
            config,
        }
    }

    /// Run one turn.
    ///
    /// The user message is stored before anything can fail upstream, so a
    /// failed reply never loses what the dreamer wrote.
    #[instrument(skip_all, fields(conversation = %key))]
    pub async fn respond(
        &self,
        key: &ConversationKey,
        block_text: &str,
        user_text: &str,
    ) -> Result<TurnReply, ConversationError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ConversationError::BadRequest(
                "message content is empty".to_string(),
            ));
        }

        let user_message = self.storage.append_message(key, Role::User, user_text)?;
        let summary = self.summaries.refresh(key, block_text).await?;
        let recent = self.storage.recent_messages(key, self.config.recent_turns)?;

        let request = self.reply_request(block_text, summary.summary_text(), &recent);
        let text = self.generator.generate(request).await?;
        let reply = self.storage.append_message(key, Role::Assistant, &text)?;

        info!(
            summary_status = summary.status(),
            last_processed_count = summary.last_processed_count(),
            "Conversation turn completed"
        );

        Ok(TurnReply {
            user_message,
            reply,
            summary,
        })
    }

    fn reply_request(
        &self,
        block_text: &str,
        summary: Option<&str>,
        recent: &[Message],
    ) -> GenerationRequest {
        let mut context = format!("Dream passage:\n{}", block_text.trim());
        if let Some(summary) = summary {
            context.push_str("\n\nConversation so far, summarized:\n");
            context.push_str(summary);
        }

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ChatMessage::system(PERSONA));
        messages.push(ChatMessage::system(context));
        messages.extend(recent.iter().map(|m| ChatMessage {
            role: m.role.into(),
            content: m.content.clone(),
        }));

        GenerationRequest::new(messages, self.config.max_tokens, self.config.temperature)
    }
}
