//! Compression prompt for the rolling summary.

use crate::dialogue::{render_transcript, Message};
use crate::llm::{ChatMessage, GenerationRequest};

use super::SummaryConfig;

const SYSTEM_PROMPT: &str = "You maintain a compact running summary of a conversation between a \
dreamer and a dream guide about one part of a dream. Merge the new turns into the existing \
summary. Keep the images, feelings, associations and open questions the dreamer raised, and \
any interpretations already offered. Drop greetings and filler. Write in the third person, \
plain prose, no lists, at most two short paragraphs.";

/// Build the compression request: anchor text, prior summary, new turns
pub fn compression_request(
    anchor_text: &str,
    prior_summary: Option<&str>,
    new_messages: &[Message],
    config: &SummaryConfig,
) -> GenerationRequest {
    let mut body = String::new();

    body.push_str("Dream passage under discussion:\n");
    body.push_str(anchor_text.trim());
    body.push_str("\n\n");

    match prior_summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => {
            body.push_str("Summary so far:\n");
            body.push_str(summary);
        }
        None => body.push_str("Summary so far: (none yet)"),
    }
    body.push_str("\n\n");

    body.push_str("New turns:\n");
    body.push_str(&render_transcript(new_messages));
    body.push_str("\n\nReturn only the updated summary.");

    GenerationRequest::new(
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(body)],
        config.max_tokens,
        config.temperature,
    )
}
