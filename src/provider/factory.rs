//! Provider registry, instance cache, and ordered fallback.
//!
//! Maps each [`ProviderKind`] to a constructor and caches the instances it
//! builds by `(provider, model)`. The factory is an explicit object owned
//! by the engine, so tests get their own cache.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use super::config::{ProviderConfig, ProviderKind};
use super::message::GenerationRequest;
use super::providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};
use super::traits::AiProvider;
use crate::error::{FailedAttempt, ProviderError};

/// Builds a provider instance from configuration.
pub type ProviderConstructor =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn AiProvider>, ProviderError> + Send + Sync>;

/// A successful generation and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated text.
    pub text: String,
    /// Provider that produced it.
    pub provider: String,
    /// Model that produced it.
    pub model: String,
    /// Number of configs tried, including the successful one.
    pub attempts: usize,
}

/// Creates and caches [`AiProvider`] instances.
///
/// # Supported Providers
///
/// - `openai`: `OpenAI`-compatible APIs via `async-openai`
/// - `anthropic`: Anthropic Messages API
/// - `gemini`: Google Gemini API
pub struct ProviderFactory {
    constructors: HashMap<ProviderKind, ProviderConstructor>,
    cache: DashMap<(ProviderKind, String), Arc<dyn AiProvider>>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("registered", &self.constructors.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl ProviderFactory {
    /// Creates a factory with the built-in vendor constructors registered.
    #[must_use]
    pub fn new() -> Self {
        let mut constructors: HashMap<ProviderKind, ProviderConstructor> = HashMap::new();
        for kind in ProviderKind::ALL {
            constructors.insert(kind, builtin_constructor(kind));
        }
        Self {
            constructors,
            cache: DashMap::new(),
        }
    }

    /// Replaces the constructor registered for `kind`.
    #[must_use]
    pub fn with_constructor<F>(mut self, kind: ProviderKind, constructor: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn AiProvider>, ProviderError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    /// Returns the cached provider for `(provider, model)`, creating and
    /// validating it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] (non-retryable) when the new
    /// instance fails validation; nothing is cached in that case.
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn AiProvider>, ProviderError> {
        let key = config.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let constructor =
            self.constructors
                .get(&config.provider)
                .ok_or_else(|| ProviderError::UnknownProvider {
                    name: config.provider.to_string(),
                })?;

        // The entry lock keeps concurrent misses on one key from caching twice.
        match self.cache.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let provider = constructor(config)?;
                if !provider.validate_config() {
                    return Err(ProviderError::InvalidConfig {
                        provider: config.provider.to_string(),
                        reason: format!(
                            "model {:?} failed validation (check api key, max tokens, temperature, timeout)",
                            config.model
                        ),
                    });
                }
                debug!(provider = %config.provider, model = %config.model, "provider created");
                entry.insert(Arc::clone(&provider));
                Ok(provider)
            }
        }
    }

    /// Tries each config in order and returns the first successful generation.
    ///
    /// A non-retryable error aborts the chain immediately and is returned
    /// as-is. Retryable errors are recorded and the next config is tried.
    /// When every config fails, returns [`ProviderError::AllProvidersFailed`].
    pub async fn generate_with_fallback(
        &self,
        configs: &[ProviderConfig],
        request: &GenerationRequest,
    ) -> Result<Generation, ProviderError> {
        if configs.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let mut attempts: Vec<FailedAttempt> = Vec::new();

        for (index, config) in configs.iter().enumerate() {
            match self.attempt(config, request).await {
                Ok(text) => {
                    info!(
                        provider = %config.provider,
                        model = %config.model,
                        attempt = index + 1,
                        "generation succeeded"
                    );
                    return Ok(Generation {
                        text,
                        provider: config.provider.to_string(),
                        model: config.model.clone(),
                        attempts: index + 1,
                    });
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        provider = %config.provider,
                        model = %config.model,
                        error = %err,
                        "non-retryable provider error, aborting fallback chain"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        provider = %config.provider,
                        model = %config.model,
                        error = %err,
                        "provider failed, trying next"
                    );
                    attempts.push(FailedAttempt {
                        provider: config.provider.to_string(),
                        model: config.model.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        Err(ProviderError::AllProvidersFailed { attempts })
    }

    /// One bounded generation attempt.
    async fn attempt(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let provider = self.create_provider(config)?;
        let text = tokio::time::timeout(config.timeout, provider.generate_response(request))
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: config.provider.to_string(),
                timeout: config.timeout,
            })??;

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: config.provider.to_string(),
            });
        }
        Ok(text)
    }

    /// Drops every cached instance.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached instances.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

fn builtin_constructor(kind: ProviderKind) -> ProviderConstructor {
    match kind {
        ProviderKind::OpenAi => Arc::new(|config: &ProviderConfig| {
            Ok(Arc::new(OpenAiProvider::new(config)) as Arc<dyn AiProvider>)
        }),
        ProviderKind::Anthropic => Arc::new(|config: &ProviderConfig| {
            Ok(Arc::new(AnthropicProvider::new(config)) as Arc<dyn AiProvider>)
        }),
        ProviderKind::Gemini => Arc::new(|config: &ProviderConfig| {
            Ok(Arc::new(GeminiProvider::new(config)) as Arc<dyn AiProvider>)
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted providers for fallback and engine tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// What a scripted provider does on every call.
    #[derive(Debug, Clone)]
    pub enum Script {
        Reply(String),
        Fail { status: u16 },
        Hang(Duration),
    }

    /// A provider that follows a fixed script and counts calls.
    #[derive(Debug)]
    pub struct ScriptedProvider {
        pub name: &'static str,
        pub model: String,
        pub script: Script,
        pub calls: AtomicUsize,
        pub last_request: Mutex<Option<GenerationRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(name: &'static str, model: &str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name,
                model: model.to_string(),
                script,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn model(&self) -> &str {
            &self.model
        }

        fn validate_config(&self) -> bool {
            true
        }

        fn estimate_cost(&self, _tokens: u32) -> f64 {
            0.0
        }

        async fn generate_response(
            &self,
            request: &GenerationRequest,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_request.lock() {
                *last = Some(request.clone());
            }
            match &self.script {
                Script::Reply(text) => Ok(text.clone()),
                Script::Fail { status } => {
                    Err(ProviderError::from_status(self.name, *status, "scripted failure"))
                }
                Script::Hang(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    /// Config for a scripted provider.
    pub fn config(kind: ProviderKind, model: &str) -> ProviderConfig {
        ProviderConfig::builder()
            .provider(kind)
            .model(model)
            .api_key("test")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    /// Factory whose every kind resolves to one of `providers` by model name.
    pub fn factory(providers: &[Arc<ScriptedProvider>]) -> ProviderFactory {
        let mut factory = ProviderFactory::new();
        for kind in ProviderKind::ALL {
            let providers: Vec<Arc<ScriptedProvider>> = providers.to_vec();
            factory = factory.with_constructor(kind, move |config: &ProviderConfig| {
                providers
                    .iter()
                    .find(|p| p.model == config.model)
                    .map(|p| Arc::clone(p) as Arc<dyn AiProvider>)
                    .ok_or_else(|| ProviderError::UnknownProvider {
                        name: config.model.clone(),
                    })
            });
        }
        factory
    }
}
