//! Anthropic Claude provider (Messages API).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::EnrichmentError;
use super::provider::{CompletionClient, http_client, post_json};

/// Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn complete(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };
        tracing::debug!(model = %self.model, "sending Anthropic request");

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let text = post_json(request, &body, |raw| {
            serde_json::from_str::<AnthropicErrorResponse>(raw)
                .ok()
                .map(|err| err.error.message)
        })?;

        reply_text(&text)
    }
}

fn reply_text(raw: &str) -> Result<String, EnrichmentError> {
    let response: AnthropicResponse = serde_json::from_str(raw)
        .map_err(|err| EnrichmentError::InvalidResponse(err.to_string()))?;

    let text = response
        .content
        .into_iter()
        .filter(|block| block.content_type == "text")
        .map(|block| block.text)
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(EnrichmentError::EmptyResponse);
    }
    Ok(text)
}
