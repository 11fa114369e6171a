//! Text Generation
//!
//! The external text-generation capability is opaque: it takes a list of chat
//! messages plus sampling limits and returns text, or fails. Every failure
//! (transport, non-success status, unusable body) is a [`GenerationError`].

mod http;

pub use http::{HttpGeneratorConfig, HttpTextGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message role on the generation wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<crate::dialogue::Role> for ChatRole {
    fn from(role: crate::dialogue::Role) -> Self {
        match role {
            crate::dialogue::Role::User => ChatRole::User,
            crate::dialogue::Role::Assistant => ChatRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }
}

/// Text generation error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Transport failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Service answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Response body was not the expected JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Response carried no text
    #[error("empty response from text generation service")]
    EmptyResponse,
    /// Client could not be configured
    #[error("configuration error: {0}")]
    Config(String),
}

/// External text generation capability
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}
