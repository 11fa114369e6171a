//! Dialogue Module
//!
//! Domain types for the per-block conversation log:
//! - [`ConversationKey`]: the `(dream, block)` pair scoping a log and its summary
//! - [`Message`]: one append-only turn
//! - [`SummaryRecord`]: the rolling summary and its processing cursor

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONVERSATION KEY
// ============================================================================

/// Composite identifier of one conversation: a block inside a dream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationKey {
    pub dream_id: String,
    pub block_id: String,
}

impl ConversationKey {
    pub fn new(dream_id: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self {
            dream_id: dream_id.into(),
            block_id: block_id.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dream_id, self.block_id)
    }
}

// ============================================================================
// ROLE
// ============================================================================

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used when rendering a transcript into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role string read back from storage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message role: {0}")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// One turn of a conversation. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_key: ConversationKey,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// SUMMARY RECORD
// ============================================================================

/// Rolling summary of a conversation.
///
/// `summary_text` covers messages `[0, last_processed_count)` in creation
/// order. The cursor never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub conversation_key: ConversationKey,
    pub summary_text: String,
    pub last_processed_count: u64,
    pub updated_at: DateTime<Utc>,
}

/// Render messages as `Label: content` lines, one per turn
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
