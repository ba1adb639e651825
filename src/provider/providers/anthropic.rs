//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{error_from_response, http_client, map_send_error};
use crate::error::ProviderError;
use crate::provider::config::{ProviderConfig, ProviderKind};
use crate::provider::message::{GenerationRequest, Role};
use crate::provider::pricing;
use crate::provider::traits::{AiProvider, config_is_usable};

const NAME: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider.
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    /// Creates a new provider from configuration.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/v1/messages")
    }

    /// The Messages API requires alternating turns that open with the user:
    /// leading assistant turns are dropped and consecutive same-role turns merged.
    fn build_messages(request: &GenerationRequest) -> Vec<AnthropicMessage> {
        let mut messages: Vec<AnthropicMessage> = Vec::new();
        for msg in request.conversation() {
            let role = match msg.role {
                Role::Assistant if messages.is_empty() => continue,
                Role::Assistant => "assistant",
                Role::User | Role::System => "user",
            };
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&msg.content);
                }
                _ => messages.push(AnthropicMessage {
                    role,
                    content: msg.content.clone(),
                }),
            }
        }
        messages
    }

    fn build_request(&self, request: &GenerationRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature.clamp(0.0, 1.0),
            system: request.grounded_system_prompt(),
            messages: Self::build_messages(request),
        }
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn validate_config(&self) -> bool {
        config_is_usable(&self.config, 1.0)
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        pricing::estimate(ProviderKind::Anthropic, &self.config.model, tokens)
    }

    async fn generate_response(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(NAME, self.config.timeout, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(NAME, response).await);
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(NAME, format!("invalid response body: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.r#type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: NAME.to_string(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::message::{assistant_message, system_message, user_message};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> AnthropicProvider {
        let config = ProviderConfig::builder()
            .provider(ProviderKind::Anthropic)
            .api_key("test-key")
            .model("claude-3-5-haiku-latest")
            .base_url(base_url)
            .build()
            .unwrap_or_else(|_| unreachable!());
        AnthropicProvider::new(&config)
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            vec![system_message("Eres la recepción."), user_message("hola")],
            100,
            0.5,
        )
    }

    #[test]
    fn test_build_messages_alternates_roles() {
        let request = GenerationRequest::new(
            vec![
                system_message("sys"),
                assistant_message("stale greeting"),
                user_message("hola"),
                user_message("¿precio?"),
                assistant_message("39€"),
            ],
            100,
            0.5,
        );
        let messages = AnthropicProvider::build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hola\n\n¿precio?");
        assert_eq!(messages[1].role, "assistant");
    }

    #[test]
    fn test_build_request_moves_system_prompt() {
        let body = provider("http://localhost").build_request(&request());
        assert_eq!(body.system.as_deref(), Some("Eres la recepción."));
        assert_eq!(body.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_response_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-3-5-haiku-latest",
                "max_tokens": 100,
                "system": "Eres la recepción."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "¡Hola! ¿En qué te ayudo?"}],
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let text = provider(&server.uri())
            .generate_response(&request())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(text, "¡Hola! ¿En qué te ayudo?");
    }

    #[tokio::test]
    async fn test_overloaded_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .generate_response(&request())
            .await
            .err()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(err.status(), Some(529));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .generate_response(&request())
            .await
            .err()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_content_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": []})),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .generate_response(&request())
            .await
            .err()
            .unwrap_or_else(|| unreachable!());
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }
}
