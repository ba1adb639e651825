//! AI provider layer.
//!
//! A uniform generation interface implemented per vendor, instantiated and
//! cached by [`ProviderFactory`], with ordered fallback across configs.
//!
//! # Architecture
//!
//! ```text
//! AgentEngine → ProviderFactory::generate_with_fallback(configs, request)
//!   ├── create_provider(config)  (cached by (provider, model))
//!   │   └── OpenAiProvider | AnthropicProvider | GeminiProvider
//!   ├── retryable error      → record attempt, next config
//!   ├── non-retryable error  → abort chain
//!   └── all failed           → ProviderError::AllProvidersFailed
//! ```

pub mod config;
pub mod factory;
pub mod message;
pub mod pricing;
pub mod providers;
pub mod traits;

pub use config::{ProviderConfig, ProviderConfigBuilder, ProviderKind};
pub use factory::{Generation, ProviderConstructor, ProviderFactory};
pub use message::{
    ChatMessage, GenerationRequest, assistant_message, system_message, user_message,
};
pub use providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};
pub use traits::AiProvider;
