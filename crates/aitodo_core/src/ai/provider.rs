//! The provider boundary shared by every LLM client.

use std::time::Duration;

use reqwest::blocking::Client;

use super::EnrichmentError;

/// Default per-request timeout for provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Given prompt text, return response text.
pub trait CompletionClient: Send + Sync {
    /// Short provider name used in logs and status output.
    fn name(&self) -> &str;

    /// Run a single completion. Each call is attempted exactly once.
    fn complete(&self, prompt: &str) -> Result<String, EnrichmentError>;
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, EnrichmentError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| EnrichmentError::Transport(format!("failed to build HTTP client: {err}")))
}

pub(crate) fn transport_error(err: reqwest::Error) -> EnrichmentError {
    if err.is_timeout() {
        EnrichmentError::Timeout
    } else {
        EnrichmentError::Transport(err.to_string())
    }
}

/// Send a JSON body and return the raw response text, mapping non-2xx
/// statuses through `error_message` to pull out the provider's own message.
pub(crate) fn post_json<B, F>(
    request: reqwest::blocking::RequestBuilder,
    body: &B,
    error_message: F,
) -> Result<String, EnrichmentError>
where
    B: serde::Serialize + ?Sized,
    F: FnOnce(&str) -> Option<String>,
{
    let response = request.json(body).send().map_err(transport_error)?;
    let status = response.status();
    let text = response.text().map_err(transport_error)?;

    if !status.is_success() {
        let message = error_message(&text).unwrap_or(text);
        return Err(EnrichmentError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(text)
}
