//! # receptionist
//!
//! Conversational engine for a gym's WhatsApp virtual receptionist.
//!
//! Every inbound message runs through one ordered pipeline: business hours,
//! an active guided flow, human-transfer rules, flow triggers, the
//! new-session greeting, text rules, AI generation with knowledge-base
//! grounding, and finally the configured fallback reply.
//!
//! ## Modules
//!
//! - [`core`]: domain types (sessions, rules, flows, settings, responses)
//! - [`engine`]: [`AgentEngine`] and its matcher, context, flow and knowledge parts
//! - [`provider`]: AI vendors behind one trait, cached and chained by [`ProviderFactory`]
//! - [`storage`]: rule, flow and knowledge stores (`SQLite` and in-memory)
//! - [`cli`]: the `receptionist` command line
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use receptionist::core::{ChatbotSettings, KeywordRule, Session};
//! use receptionist::engine::{AgentEngine, EngineOptions};
//! use receptionist::provider::ProviderFactory;
//! use receptionist::storage::NoKnowledge;
//!
//! # async fn demo() {
//! let engine = AgentEngine::new(
//!     ChatbotSettings::default(),
//!     vec![KeywordRule::text("precio", &["precio"], "La cuota es de 39€/mes")],
//!     Vec::new(),
//!     Arc::new(ProviderFactory::new()),
//!     Arc::new(NoKnowledge),
//!     EngineOptions::default(),
//! );
//! let mut session = Session::new("s-1", "34600000000@s.whatsapp.net");
//! let reply = engine.process_message("hola", &mut session).await;
//! assert!(reply.success);
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod engine;
pub mod error;
pub mod provider;
pub mod storage;

pub use crate::core::{AgentResponse, ChatbotSettings, ConversationFlow, KeywordRule, Session};
pub use engine::{AgentEngine, EngineOptions};
pub use error::{EngineError, Error, FlowError, ProviderError, Result, StorageError};
pub use provider::{AiProvider, ProviderConfig, ProviderFactory, ProviderKind};
