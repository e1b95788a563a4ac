//! AI enrichment for tasks.
//!
//! This module provides:
//! - the [`CompletionClient`] boundary that any LLM provider sits behind
//! - Gemini and Anthropic clients on blocking `reqwest`
//! - the [`Gateway`], which turns prompt replies into task fields and falls
//!   back to fixed values whenever the provider is missing or misbehaves
//! - JSON extraction helpers for replies wrapped in prose

pub mod anthropic;
pub mod extract;
pub mod gemini;
mod gateway;
pub mod prompts;
pub mod provider;

pub use anthropic::AnthropicClient;
pub use gateway::{Gateway, MAX_SUBTASK_CHARS, MAX_SUBTASKS, ParsedTask};
pub use gemini::GeminiClient;
pub use provider::CompletionClient;

use thiserror::Error;

/// Why an enrichment call produced no usable result. Never leaves the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("no AI provider configured")]
    Disabled,
    #[error("provider request timed out")]
    Timeout,
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("provider response could not be read: {0}")]
    InvalidResponse(String),
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("no JSON found in provider reply")]
    NoJson,
    #[error("malformed JSON in provider reply: {0}")]
    MalformedJson(String),
}
