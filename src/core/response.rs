//! The engine's output contract.

use serde::{Deserialize, Serialize};

/// Machine-readable outcome tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The chatbot is switched off.
    ChatbotDisabled,
    /// The pipeline failed and the fallback message was sent instead.
    ProcessingError,
}

impl ErrorCode {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChatbotDisabled => "CHATBOT_DISABLED",
            Self::ProcessingError => "PROCESSING_ERROR",
        }
    }
}

/// Which pipeline stage produced the reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// A keyword rule.
    Rule,
    /// A conversation flow.
    Flow,
    /// The new-session greeting.
    Greeting,
    /// AI generation.
    Ai,
    /// The configured fallback message.
    #[default]
    Fallback,
    /// The out-of-hours policy.
    OutsideHours,
    /// The chatbot is disabled.
    Disabled,
}

/// Instruction for the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    /// Hand the conversation to a human.
    Transfer,
}

/// Details about how a reply was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Producing stage.
    pub source: ResponseSource,
    /// Transport instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ResponseAction>,
    /// Matched rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Flow started, advanced or completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    /// The flow finished on this turn.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flow_completed: bool,
    /// Provider that generated the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ResponseMetadata {
    /// Metadata carrying only the producing stage.
    #[must_use]
    pub fn from_source(source: ResponseSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }
}

/// Result of processing one inbound message.
///
/// Either `message` is the definitive reply, or `success` is `false` and
/// `error` says why nothing should be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Whether a reply should be delivered.
    pub success: bool,
    /// Reply text.
    pub message: String,
    /// Outcome tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// How the reply was produced.
    pub metadata: ResponseMetadata,
}

impl AgentResponse {
    /// A successful reply.
    #[must_use]
    pub fn reply(message: impl Into<String>, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            metadata,
        }
    }

    /// The disabled-chatbot refusal.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            success: false,
            message: String::new(),
            error: Some(ErrorCode::ChatbotDisabled),
            metadata: ResponseMetadata::from_source(ResponseSource::Disabled),
        }
    }

    /// The fallback reply sent after an internal failure.
    #[must_use]
    pub fn processing_error(fallback: impl Into<String>) -> Self {
        Self {
            success: true,
            message: fallback.into(),
            error: Some(ErrorCode::ProcessingError),
            metadata: ResponseMetadata::from_source(ResponseSource::Fallback),
        }
    }

    /// Whether the transport should hand the chat to a human.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.metadata.action == Some(ResponseAction::Transfer)
    }
}
