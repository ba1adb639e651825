//! `OpenAI` provider implementation.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`ProviderConfig`]. Requests are typed with
//! `async-openai` and sent through the shared reqwest client, so every call
//! is exactly one HTTP request and the status code survives into
//! [`ProviderError`].

use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{error_from_response, http_client, map_send_error};
use crate::error::ProviderError;
use crate::provider::config::{ProviderConfig, ProviderKind};
use crate::provider::message::{ChatMessage, GenerationRequest, Role};
use crate::provider::pricing;
use crate::provider::traits::{AiProvider, config_is_usable};

const NAME: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI`-compatible AI provider.
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
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
        format!("{base}/chat/completions")
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    ///
    /// The grounded system prompt goes first, followed by the conversation
    /// without its own system entries.
    fn build_request(&self, request: &GenerationRequest) -> CreateChatCompletionRequest {
        let system = request
            .grounded_system_prompt()
            .map(|prompt| ChatMessage {
                role: Role::System,
                content: prompt,
            });

        let messages: Vec<_> = system
            .iter()
            .chain(request.conversation())
            .map(Self::convert_message)
            .collect();

        CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(request.temperature),
            max_completion_tokens: Some(request.max_tokens),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn validate_config(&self) -> bool {
        config_is_usable(&self.config, 2.0)
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        pricing::estimate(ProviderKind::OpenAi, &self.config.model, tokens)
    }

    async fn generate_response(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(NAME, self.config.timeout, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(NAME, response).await);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(NAME, format!("invalid response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                provider: NAME.to_string(),
            })
    }
}
