//! HTTP text generation client.
//!
//! POSTs `{model?, messages, max_tokens, temperature}` as JSON with optional
//! Bearer auth and reads `{text}` (or `{response}`) back.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{ChatMessage, GenerationError, GenerationRequest, TextGenerator};

/// Longest error body kept in an [`GenerationError::Api`] message
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGeneratorConfig {
    /// Full URL of the generation endpoint
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl HttpGeneratorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(alias = "response")]
    text: Option<String>,
}

/// [`TextGenerator`] over HTTP
pub struct HttpTextGenerator {
    config: HttpGeneratorConfig,
    client: reqwest::Client,
}

impl HttpTextGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| GenerationError::Config(format!("Invalid API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    #[instrument(skip_all, fields(endpoint = %self.config.endpoint))]
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = WireRequest {
            model: self.config.model.as_deref(),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            message_count = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending generation request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| message.is_char_boundary(*i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            warn!(status = status.as_u16(), "Generation request failed");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: WireResponse = serde_json::from_slice(&bytes)?;

        match parsed.text.map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(GenerationError::EmptyResponse),
        }
    }
}
