//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{error_from_response, http_client, map_send_error};
use crate::error::ProviderError;
use crate::provider::config::{ProviderConfig, ProviderKind};
use crate::provider::message::{GenerationRequest, Role};
use crate::provider::pricing;
use crate::provider::traits::{AiProvider, config_is_usable};

const NAME: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini provider.
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GeminiProvider {
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
        format!("{base}/v1beta/models/{}:generateContent", self.config.model)
    }

    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        let contents = request
            .conversation()
            .map(|msg| GeminiContent {
                role: Some(
                    match msg.role {
                        Role::Assistant => "model",
                        Role::User | Role::System => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request.grounded_system_prompt().map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
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
        pricing::estimate(ProviderKind::Gemini, &self.config.model, tokens)
    }

    async fn generate_response(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = Self::build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(NAME, self.config.timeout, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(NAME, response).await);
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(NAME, format!("invalid response body: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: NAME.to_string(),
            });
        }
        Ok(text)
    }
}
