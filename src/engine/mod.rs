//! Conversational-agent orchestration.
//!
//! [`AgentEngine`] decides, for each inbound message, what the receptionist
//! says next. Stages run in a fixed order and the first definitive answer
//! wins:
//!
//! ```text
//! process_message(text, &mut session)
//!   ├── chatbot disabled         → CHATBOT_DISABLED
//!   ├── outside business hours   → out-of-hours message (success)
//!   ├── stamp last activity
//!   ├── active flow              → FlowExecutor::advance
//!   ├── transfer rule            → rule body + action: transfer
//!   ├── flow rule / trigger      → FlowExecutor::start
//!   ├── new session              → welcome message
//!   ├── text rule                → rule body
//!   ├── AI enabled               → context + knowledge + fallback chain
//!   └── otherwise                → fallback message
//! ```

pub mod context;
pub mod flow;
pub mod knowledge;
pub mod matcher;

pub use context::ContextManager;
pub use flow::{FlowExecutor, FlowOutcome};
pub use knowledge::{KnowledgeRetriever, extract_keywords};
pub use matcher::KeywordMatcher;

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::core::{
    AgentResponse, ChatbotSettings, ConversationFlow, KeywordRule, ResponseAction,
    ResponseMetadata, ResponseSource, ResponseType, Role, Session,
};
use crate::error::{EngineError, StorageError};
use crate::provider::{GenerationRequest, ProviderConfig, ProviderFactory};
use crate::storage::{FlowStore, KnowledgeStore, RuleStore};

/// Tunables that are not part of the chatbot settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// History messages sent to providers, clamped to `[1, 100]`.
    pub window_size: usize,
    /// Knowledge snippets per AI turn, clamped to `[1, 10]`.
    pub max_chunks: usize,
    /// Minimum knowledge relevance, clamped to `[0, 1]`.
    pub min_relevance: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            window_size: context::DEFAULT_WINDOW_SIZE,
            max_chunks: knowledge::DEFAULT_MAX_CHUNKS,
            min_relevance: knowledge::DEFAULT_MIN_RELEVANCE,
        }
    }
}

/// The receptionist's decision engine.
///
/// Shared across sessions. Rules, flows and settings can be swapped while
/// messages are being processed; each call works on the copies it loaded
/// when it started.
pub struct AgentEngine {
    settings: ArcSwap<ChatbotSettings>,
    matcher: ArcSwap<KeywordMatcher>,
    flows: ArcSwap<Vec<ConversationFlow>>,
    factory: Arc<ProviderFactory>,
    retriever: ArcSwap<KnowledgeRetriever>,
    context: ContextManager,
    executor: FlowExecutor,
}

impl std::fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEngine")
            .field("rules", &self.matcher.load().len())
            .field("flows", &self.flows.load().len())
            .field("context", &self.context)
            .field("retriever", &self.retriever.load_full())
            .finish_non_exhaustive()
    }
}

impl AgentEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        settings: ChatbotSettings,
        rules: Vec<KeywordRule>,
        flows: Vec<ConversationFlow>,
        factory: Arc<ProviderFactory>,
        knowledge: Arc<dyn KnowledgeStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            settings: ArcSwap::from_pointee(settings),
            matcher: ArcSwap::from_pointee(KeywordMatcher::new(rules)),
            flows: ArcSwap::from_pointee(flows),
            factory,
            retriever: ArcSwap::from_pointee(
                KnowledgeRetriever::new(knowledge)
                    .with_max_chunks(options.max_chunks)
                    .with_min_relevance(options.min_relevance),
            ),
            context: ContextManager::new(options.window_size),
            executor: FlowExecutor,
        }
    }

    /// Creates an engine with rules and flows read from stores.
    pub fn from_stores(
        settings: ChatbotSettings,
        rules: &dyn RuleStore,
        flows: &dyn FlowStore,
        factory: Arc<ProviderFactory>,
        knowledge: Arc<dyn KnowledgeStore>,
        options: EngineOptions,
    ) -> Result<Self, StorageError> {
        Ok(Self::new(
            settings,
            rules.load_rules()?,
            flows.load_flows()?,
            factory,
            knowledge,
            options,
        ))
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> Arc<ChatbotSettings> {
        self.settings.load_full()
    }

    /// Replaces the settings for subsequent calls.
    ///
    /// Cached providers hold the credentials and endpoints they were built
    /// with, so any change to the AI section drops them.
    pub fn update_settings(&self, settings: ChatbotSettings) {
        let ai_changed = self.settings.load().ai != settings.ai;
        self.settings.store(Arc::new(settings));
        if ai_changed {
            self.factory.clear_cache();
            info!("AI settings changed, provider cache cleared");
        }
        info!("chatbot settings updated");
    }

    /// Adjusts knowledge retrieval for subsequent calls. Values are clamped
    /// to `[1, 10]` snippets and a `[0, 1]` relevance floor.
    pub fn set_knowledge_limits(&self, max_chunks: usize, min_relevance: f64) {
        let mut retriever = KnowledgeRetriever::clone(&self.retriever.load_full());
        retriever.set_max_chunks(max_chunks);
        retriever.set_min_relevance(min_relevance);
        info!(
            max_chunks = retriever.max_chunks(),
            min_relevance = retriever.min_relevance(),
            "knowledge limits updated"
        );
        self.retriever.store(Arc::new(retriever));
    }

    /// Current `(max_chunks, min_relevance)` knowledge limits.
    #[must_use]
    pub fn knowledge_limits(&self) -> (usize, f64) {
        let retriever = self.retriever.load();
        (retriever.max_chunks(), retriever.min_relevance())
    }

    /// Replaces the rule set for subsequent calls.
    pub fn reload_rules(&self, rules: Vec<KeywordRule>) {
        let matcher = KeywordMatcher::new(rules);
        info!(rules = matcher.len(), "keyword rules reloaded");
        self.matcher.store(Arc::new(matcher));
    }

    /// Replaces the flow definitions for subsequent calls.
    ///
    /// Sessions already inside a flow that disappeared are abandoned on
    /// their next message.
    pub fn reload_flows(&self, flows: Vec<ConversationFlow>) {
        info!(flows = flows.len(), "conversation flows reloaded");
        self.flows.store(Arc::new(flows));
    }

    /// Re-reads rules and flows from stores.
    pub fn reload_from(&self, rules: &dyn RuleStore, flows: &dyn FlowStore) -> Result<(), StorageError> {
        let rules = rules.load_rules()?;
        let flows = flows.load_flows()?;
        self.reload_rules(rules);
        self.reload_flows(flows);
        Ok(())
    }

    /// Shared provider factory.
    #[must_use]
    pub fn factory(&self) -> &ProviderFactory {
        &self.factory
    }

    /// Produces the reply to one inbound message and updates `session`.
    ///
    /// Never fails: internal errors become the fallback message tagged
    /// `PROCESSING_ERROR`. Calls for one session must not overlap.
    pub async fn process_message(&self, text: &str, session: &mut Session) -> AgentResponse {
        self.process_message_at(text, session, Utc::now()).await
    }

    /// [`process_message`](Self::process_message) with an explicit clock.
    pub async fn process_message_at(
        &self,
        text: &str,
        session: &mut Session,
        now: DateTime<Utc>,
    ) -> AgentResponse {
        let settings = self.settings.load_full();

        if !settings.enabled {
            debug!(session_id = %session.id, "chatbot disabled");
            return AgentResponse::disabled();
        }

        match self.dispatch(text, session, &settings, now).await {
            Ok(response) => response,
            Err(err) => {
                error!(session_id = %session.id, error = %err, "message processing failed");
                AgentResponse::processing_error(settings.fallback_message.clone())
            }
        }
    }

    async fn dispatch(
        &self,
        text: &str,
        session: &mut Session,
        settings: &ChatbotSettings,
        now: DateTime<Utc>,
    ) -> Result<AgentResponse, EngineError> {
        if settings.business_hours.blocks_reply_at(now) {
            debug!(session_id = %session.id, "outside business hours");
            return Ok(AgentResponse::reply(
                settings.business_hours.outside_hours_message.clone(),
                ResponseMetadata::from_source(ResponseSource::OutsideHours),
            ));
        }

        session.last_activity_at = now;

        let flows = self.flows.load_full();
        if session.active_flow.is_some() {
            return Ok(self.continue_flow(text, session, &flows, settings));
        }

        let matcher = self.matcher.load_full();

        if let Some(rule) = matcher.match_rule(text, ResponseType::Transfer) {
            info!(session_id = %session.id, rule_id = %rule.id, "transfer rule matched");
            return Ok(AgentResponse::reply(
                rule.response.clone(),
                ResponseMetadata {
                    action: Some(ResponseAction::Transfer),
                    rule_id: Some(rule.id.clone()),
                    ..ResponseMetadata::from_source(ResponseSource::Rule)
                },
            ));
        }

        if let Some(flow) = Self::triggered_flow(&matcher, &flows, text) {
            let prompt = self.executor.start(session, flow)?;
            info!(session_id = %session.id, flow_id = %flow.id, "flow started");
            return Ok(AgentResponse::reply(
                prompt,
                ResponseMetadata {
                    flow_id: Some(flow.id.clone()),
                    ..ResponseMetadata::from_source(ResponseSource::Flow)
                },
            ));
        }

        if session.is_new_session {
            session.is_new_session = false;
            debug!(session_id = %session.id, "greeting new session");
            return Ok(AgentResponse::reply(
                settings.welcome_message.clone(),
                ResponseMetadata::from_source(ResponseSource::Greeting),
            ));
        }

        if let Some(rule) = matcher.match_rule(text, ResponseType::Text) {
            info!(session_id = %session.id, rule_id = %rule.id, "text rule matched");
            return Ok(AgentResponse::reply(
                rule.response.clone(),
                ResponseMetadata {
                    rule_id: Some(rule.id.clone()),
                    ..ResponseMetadata::from_source(ResponseSource::Rule)
                },
            ));
        }

        if settings.ai.enabled
            && let Some(response) = self.generate(text, session, settings).await?
        {
            return Ok(response);
        }

        debug!(session_id = %session.id, "no match, sending fallback");
        Ok(AgentResponse::reply(
            settings.fallback_message.clone(),
            ResponseMetadata::from_source(ResponseSource::Fallback),
        ))
    }

    fn continue_flow(
        &self,
        text: &str,
        session: &mut Session,
        flows: &[ConversationFlow],
        settings: &ChatbotSettings,
    ) -> AgentResponse {
        let flow_id = session.current_flow_id().map(ToString::to_string);

        match self.executor.advance(text, session, flows) {
            Ok(outcome) => {
                if outcome.completed {
                    info!(
                        session_id = %session.id,
                        flow_id = ?flow_id,
                        answers = ?outcome.collected,
                        "flow completed"
                    );
                }
                AgentResponse::reply(
                    outcome.message,
                    ResponseMetadata {
                        flow_id,
                        flow_completed: outcome.completed,
                        ..ResponseMetadata::from_source(ResponseSource::Flow)
                    },
                )
            }
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "abandoning flow");
                session.clear_flow();
                AgentResponse::reply(
                    settings.fallback_message.clone(),
                    ResponseMetadata {
                        flow_id,
                        ..ResponseMetadata::from_source(ResponseSource::Fallback)
                    },
                )
            }
        }
    }

    /// Flow named by a `flow` rule, else the first enabled flow whose
    /// trigger phrase appears in `text`.
    fn triggered_flow<'f>(
        matcher: &KeywordMatcher,
        flows: &'f [ConversationFlow],
        text: &str,
    ) -> Option<&'f ConversationFlow> {
        if let Some(rule) = matcher.match_rule(text, ResponseType::Flow) {
            let target = rule.response.trim();
            match flows.iter().find(|f| f.enabled && f.id == target) {
                Some(flow) => return Some(flow),
                None => warn!(rule_id = %rule.id, flow_id = %target, "flow rule points to unknown flow"),
            }
        }
        flows.iter().find(|f| f.enabled && f.is_triggered_by(text))
    }

    /// AI reply, or `None` when no provider in the chain has credentials.
    async fn generate(
        &self,
        text: &str,
        session: &mut Session,
        settings: &ChatbotSettings,
    ) -> Result<Option<AgentResponse>, EngineError> {
        let ai = &settings.ai;
        let chain = ProviderConfig::chain_from_settings(ai)?;
        if chain.iter().all(|c| c.api_key.trim().is_empty()) {
            warn!("AI enabled but no provider has an API key, skipping generation");
            return Ok(None);
        }

        let snippets = if ai.use_knowledge_base {
            let retriever = self.retriever.load_full();
            retriever.retrieve(text).await
        } else {
            Vec::new()
        };

        self.context.append(session, Role::User, text);
        let messages = self.context.render(session, ai.system_prompt.as_deref());
        let request =
            GenerationRequest::new(messages, ai.max_tokens, ai.temperature).with_knowledge(snippets);

        let generation = match self.factory.generate_with_fallback(&chain, &request).await {
            Ok(generation) => generation,
            Err(err) => {
                // Drop the unanswered user turn.
                if session
                    .messages
                    .last()
                    .is_some_and(|m| m.role == Role::User && m.content == text)
                {
                    session.messages.pop();
                }
                return Err(err.into());
            }
        };
        info!(
            session_id = %session.id,
            provider = %generation.provider,
            model = %generation.model,
            attempts = generation.attempts,
            "AI reply generated"
        );

        self.context
            .append(session, Role::Assistant, generation.text.as_str());
        Ok(Some(AgentResponse::reply(
            generation.text,
            ResponseMetadata {
                provider: Some(generation.provider),
                ..ResponseMetadata::from_source(ResponseSource::Ai)
            },
        )))
    }
}
