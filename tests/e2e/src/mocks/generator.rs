//! Scripted Text Generator
//!
//! Stands in for the external text-generation service. Replies come from a
//! script first; once the script is empty every call answers
//! `"generated N"`. Every request is recorded so tests can count calls and
//! inspect prompts.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dreamlog_core::{GenerationError, GenerationRequest, TextGenerator};

enum Scripted {
    Text(String),
    Failure(u16),
}

#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    down: AtomicBool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Scripted::Text(text.into()));
        self
    }

    /// Queue a failed call with the given status
    pub fn push_failure(&self, status: u16) -> &Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(Scripted::Failure(status));
        self
    }

    /// While down, every call fails regardless of the script
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("request lock poisoned").len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("request lock poisoned").clone()
    }

    /// Concatenated contents of the most recent request
    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .expect("request lock poisoned")
            .last()
            .map(|r| {
                r.messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let n = {
            let mut requests = self.requests.lock().expect("request lock poisoned");
            requests.push(request);
            requests.len()
        };

        if self.down.load(Ordering::SeqCst) {
            return Err(GenerationError::Api {
                status: 503,
                message: "text generation is down".to_string(),
            });
        }

        let next = self.script.lock().expect("script lock poisoned").pop_front();
        match next {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(status)) => Err(GenerationError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Ok(format!("generated {n}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dreamlog_core::ChatMessage;

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest::new(vec![ChatMessage::user(text)], 16, 0.0)
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let generator = ScriptedGenerator::new();
        generator.push_text("first").push_failure(500);

        assert_eq!(generator.generate(request("a")).await.unwrap(), "first");
        assert!(generator.generate(request("b")).await.is_err());
        assert_eq!(generator.generate(request("c")).await.unwrap(), "generated 3");
        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.last_prompt(), "c");
    }

    #[tokio::test]
    async fn test_down_overrides_script() {
        let generator = ScriptedGenerator::new();
        generator.push_text("kept for later");
        generator.set_down(true);
        assert!(generator.generate(request("a")).await.is_err());

        generator.set_down(false);
        assert_eq!(generator.generate(request("b")).await.unwrap(), "kept for later");
    }
}
