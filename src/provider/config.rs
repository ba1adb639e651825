//! Provider configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::{AiConfig, FallbackProvider};
use crate::error::ProviderError;

/// Default maximum tokens per reply. Chat replies are short.
const DEFAULT_MAX_TOKENS: u32 = 500;
/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Supported AI vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    /// `OpenAI` Chat Completions (and compatible APIs).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini `generateContent`.
    Gemini,
}

impl ProviderKind {
    /// All registered kinds.
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::Anthropic, Self::Gemini];

    /// Canonical provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Default model for the vendor.
    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    /// Vendor-specific API key environment variable.
    #[must_use]
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(ProviderError::UnknownProvider {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one provider instance.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    /// Vendor.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// API key for the vendor.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Creates a new builder for `ProviderConfig`.
    #[must_use]
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::builder().from_env().build()
    }

    /// Cache key: one instance per vendor and model.
    #[must_use]
    pub fn cache_key(&self) -> (ProviderKind, String) {
        (self.provider, self.model.clone())
    }

    /// Ordered fallback chain described by the chatbot's AI settings:
    /// the primary provider first, then each configured fallback.
    ///
    /// Empty API keys are resolved from the environment.
    pub fn chain_from_settings(ai: &AiConfig) -> Result<Vec<Self>, ProviderError> {
        let timeout = Duration::from_secs(ai.timeout_secs);
        let primary = FallbackProvider {
            provider: ai.provider.clone(),
            model: ai.model.clone(),
            api_key: ai.api_key.clone(),
            base_url: ai.base_url.clone(),
        };

        std::iter::once(&primary)
            .chain(ai.fallbacks.iter())
            .map(|entry| {
                let kind = entry.provider.parse::<ProviderKind>()?;
                let api_key = if entry.api_key.is_empty() {
                    std::env::var(kind.api_key_env())
                        .or_else(|_| std::env::var("RECEPTIONIST_API_KEY"))
                        .unwrap_or_default()
                } else {
                    entry.api_key.clone()
                };
                let mut builder = Self::builder()
                    .provider(kind)
                    .model(&entry.model)
                    .api_key(api_key)
                    .max_tokens(ai.max_tokens)
                    .temperature(ai.temperature)
                    .timeout(timeout);
                if let Some(url) = &entry.base_url {
                    builder = builder.base_url(url);
                }
                builder.build()
            })
            .collect()
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigBuilder {
    provider: Option<ProviderKind>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
}

impl ProviderConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RECEPTIONIST_PROVIDER")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.model.is_none() {
            self.model = std::env::var("RECEPTIONIST_MODEL").ok();
        }
        if self.api_key.is_none() {
            let kind = self.provider.unwrap_or(ProviderKind::OpenAi);
            self.api_key = std::env::var(kind.api_key_env())
                .or_else(|_| std::env::var("RECEPTIONIST_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("RECEPTIONIST_BASE_URL").ok();
        }
        if self.timeout.is_none() {
            self.timeout = std::env::var("RECEPTIONIST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        self
    }

    /// Sets the provider.
    #[must_use]
    pub const fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the maximum tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Builds the [`ProviderConfig`].
    ///
    /// A missing API key is not an error here; the provider's
    /// `validate_config` rejects it when the factory creates the instance.
    pub fn build(self) -> Result<ProviderConfig, ProviderError> {
        let provider = self.provider.unwrap_or(ProviderKind::OpenAi);
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok(ProviderConfig {
            provider,
            model,
            api_key: self.api_key.unwrap_or_default(),
            base_url: self.base_url,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ProviderConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_uses_vendor_default_model() {
        let config = ProviderConfig::builder()
            .provider(ProviderKind::Gemini)
            .api_key("k")
            .model("  ")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().ok(), Some(ProviderKind::OpenAi));
        assert_eq!("claude".parse::<ProviderKind>().ok(), Some(ProviderKind::Anthropic));
        assert_eq!("google".parse::<ProviderKind>().ok(), Some(ProviderKind::Gemini));
        assert!(matches!(
            "mistral".parse::<ProviderKind>(),
            Err(ProviderError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::builder()
            .api_key("sk-secret")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_chain_from_settings_preserves_order() {
        let ai = AiConfig {
            enabled: true,
            provider: "anthropic".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            api_key: "a-key".to_string(),
            timeout_secs: 12,
            fallbacks: vec![FallbackProvider {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: "o-key".to_string(),
                base_url: None,
            }],
            ..AiConfig::default()
        };
        let chain = ProviderConfig::chain_from_settings(&ai).unwrap_or_else(|_| unreachable!());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].provider, ProviderKind::Anthropic);
        assert_eq!(chain[0].api_key, "a-key");
        assert_eq!(chain[1].provider, ProviderKind::OpenAi);
        assert_eq!(chain[1].timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_chain_rejects_unknown_provider() {
        let ai = AiConfig {
            provider: "mistral".to_string(),
            ..AiConfig::default()
        };
        assert!(ProviderConfig::chain_from_settings(&ai).is_err());
    }
}
