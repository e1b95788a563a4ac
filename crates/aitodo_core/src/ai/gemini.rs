//! Google Gemini provider (`generateContent` REST endpoint).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::EnrichmentError;
use super::provider::{CompletionClient, http_client, post_json};

/// Gemini API base URL
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
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

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, prompt: &str) -> Result<String, EnrichmentError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };
        tracing::debug!(model = %self.model, "sending Gemini request");

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let text = post_json(request, &body, |raw| {
            serde_json::from_str::<GeminiErrorResponse>(raw)
                .ok()
                .map(|err| err.error.message)
        })?;

        reply_text(&text)
    }
}

fn reply_text(raw: &str) -> Result<String, EnrichmentError> {
    let response: GeminiResponse = serde_json::from_str(raw)
        .map_err(|err| EnrichmentError::InvalidResponse(err.to_string()))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(EnrichmentError::EmptyResponse);
    }
    Ok(text)
}
