//! Provider-agnostic message types for AI generation.
//!
//! These types decouple the engine from any specific vendor API, so the
//! same rendered context works across `OpenAI`, Anthropic, and Gemini.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

pub use crate::core::Role;

/// Heading for the knowledge section folded into the system prompt.
const KNOWLEDGE_HEADING: &str = "Reference information about the business \
(use it when relevant, do not invent anything beyond it):";

/// A single chat message as sent to a provider. Timestamps are stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
}

/// A generation request (provider-agnostic).
///
/// The model is not part of the request: each provider instance is bound
/// to one model when the factory creates it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Ordered conversation, normally starting with one system message.
    pub messages: Vec<ChatMessage>,
    /// System prompt override. Takes precedence over a leading system message.
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Knowledge snippets the provider folds into its system prompt.
    pub knowledge_context: Vec<String>,
}

impl GenerationRequest {
    /// Creates a request over the given messages.
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            system_prompt: None,
            max_tokens,
            temperature,
            knowledge_context: Vec::new(),
        }
    }

    /// Sets the system prompt override.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attaches knowledge snippets.
    #[must_use]
    pub fn with_knowledge(mut self, snippets: Vec<String>) -> Self {
        self.knowledge_context = snippets;
        self
    }

    /// System prompt to send, with knowledge snippets appended as a
    /// numbered reference section.
    #[must_use]
    pub fn grounded_system_prompt(&self) -> Option<String> {
        let base = self.system_prompt.clone().or_else(|| {
            self.messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.clone())
        });

        if self.knowledge_context.is_empty() {
            return base;
        }

        let mut prompt = base.unwrap_or_default();
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(KNOWLEDGE_HEADING);
        for (i, snippet) in self.knowledge_context.iter().enumerate() {
            let _ = write!(prompt, "\n{}. {}", i + 1, snippet.trim());
        }
        Some(prompt)
    }

    /// Non-system messages in order.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
    }
}

/// Creates an assistant message.
#[must_use]
pub fn assistant_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: content.to_string(),
    }
}
