//! Pluggable AI provider trait.
//!
//! Implementations translate a provider-agnostic [`GenerationRequest`]
//! into one vendor HTTP call. This keeps the engine decoupled from any
//! particular LLM vendor.

use async_trait::async_trait;

use super::config::ProviderConfig;
use super::message::GenerationRequest;
use crate::error::ProviderError;

/// Trait for AI provider backends.
///
/// Instances are cached by the factory and shared across sessions, so
/// they must not hold per-conversation state.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"anthropic"`).
    fn name(&self) -> &'static str;

    /// Model this instance generates with.
    fn model(&self) -> &str;

    /// Whether the configuration this instance was built from is usable.
    fn validate_config(&self) -> bool;

    /// Estimated USD cost of `tokens` tokens with this provider's model.
    fn estimate_cost(&self, tokens: u32) -> f64;

    /// Generates one reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on HTTP failures, timeouts, or empty replies,
    /// classified as retryable or not.
    async fn generate_response(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Checks the limits every vendor shares. `max_temperature` differs per vendor.
pub(crate) fn config_is_usable(config: &ProviderConfig, max_temperature: f32) -> bool {
    !config.api_key.trim().is_empty()
        && !config.model.trim().is_empty()
        && config.max_tokens > 0
        && (0.0..=max_temperature).contains(&config.temperature)
        && !config.timeout.is_zero()
}
