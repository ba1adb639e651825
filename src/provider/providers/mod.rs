//! Concrete AI provider implementations.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::ProviderError;

/// Maximum error body kept in provider errors; vendor bodies can be large.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client bounded by the provider timeout.
pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Maps a failed `send()` into the provider taxonomy.
pub(crate) fn map_send_error(provider: &str, timeout: Duration, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout {
            provider: provider.to_string(),
            timeout,
        };
    }
    match err.status() {
        Some(status) => ProviderError::from_status(provider, status.as_u16(), err.to_string()),
        None => ProviderError::transport(provider, err.to_string()),
    }
}

/// Builds an error from a non-success response, truncating the body.
pub(crate) async fn error_from_response(provider: &str, response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = if body.len() > MAX_ERROR_BODY {
        let cut = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= MAX_ERROR_BODY)
            .last()
            .unwrap_or(0);
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };
    ProviderError::from_status(provider, status, message)
}
