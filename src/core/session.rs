//! Conversation session state.
//!
//! A [`Session`] is owned by the transport between calls and lent to the
//! engine by `&mut` for exactly one message-processing call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The contact writing to the business.
    User,
    /// The receptionist.
    Assistant,
}

impl Role {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single history entry. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

/// The flow a session is currently walking through.
///
/// Flow and step ids live together so they can never be half-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFlow {
    /// Id of the running flow.
    pub flow_id: String,
    /// Id of the step awaiting the user's answer.
    pub step_id: String,
}

/// One ongoing conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Linked client record, when the contact is a known client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Contact address (phone number or chat JID).
    pub contact: String,
    /// `true` until the greeting has been sent.
    pub is_new_session: bool,
    /// Active flow, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_flow: Option<ActiveFlow>,
    /// Answers collected by the active flow, keyed by step id.
    #[serde(default)]
    pub flow_data: HashMap<String, serde_json::Value>,
    /// Conversation history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Last time a message was processed.
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Opens a fresh session for a contact.
    #[must_use]
    pub fn new(id: impl Into<String>, contact: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            client_id: None,
            contact: contact.into(),
            is_new_session: true,
            active_flow: None,
            flow_data: HashMap::new(),
            messages: Vec::new(),
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Links the session to a client record.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Id of the running flow.
    #[must_use]
    pub fn current_flow_id(&self) -> Option<&str> {
        self.active_flow.as_ref().map(|f| f.flow_id.as_str())
    }

    /// Id of the step awaiting an answer.
    #[must_use]
    pub fn current_step_id(&self) -> Option<&str> {
        self.active_flow.as_ref().map(|f| f.step_id.as_str())
    }

    /// Enters a flow at the given step, discarding any previous flow data.
    pub fn enter_flow(&mut self, flow_id: impl Into<String>, step_id: impl Into<String>) {
        self.active_flow = Some(ActiveFlow {
            flow_id: flow_id.into(),
            step_id: step_id.into(),
        });
        self.flow_data.clear();
    }

    /// Moves the active flow to another step, keeping collected data.
    /// Does nothing when no flow is active.
    pub fn enter_step(&mut self, step_id: impl Into<String>) {
        if let Some(active) = self.active_flow.as_mut() {
            active.step_id = step_id.into();
        }
    }

    /// Leaves the active flow, clearing its ids and collected data together.
    pub fn clear_flow(&mut self) {
        self.active_flow = None;
        self.flow_data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("s-1", "+34600000000");
        assert!(session.is_new_session);
        assert!(session.active_flow.is_none());
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, session.last_activity_at);
    }

    #[test]
    fn test_enter_flow_resets_data() {
        let mut session = Session::new("s-1", "+34600000000");
        session
            .flow_data
            .insert("old".to_string(), serde_json::json!("value"));
        session.enter_flow("trial", "name");
        assert_eq!(session.current_flow_id(), Some("trial"));
        assert_eq!(session.current_step_id(), Some("name"));
        assert!(session.flow_data.is_empty());
    }

    #[test]
    fn test_clear_flow_clears_both_ids() {
        let mut session = Session::new("s-1", "+34600000000");
        session.enter_flow("trial", "name");
        session
            .flow_data
            .insert("name".to_string(), serde_json::json!("Ana"));
        session.clear_flow();
        assert!(session.current_flow_id().is_none());
        assert!(session.current_step_id().is_none());
        assert!(session.flow_data.is_empty());
    }

    #[test]
    fn test_session_serialization_is_camel_case() {
        let mut session = Session::new("s-1", "+34600000000").with_client("c-9");
        session.enter_flow("trial", "name");
        let json = serde_json::to_string(&session).unwrap_or_default();
        assert!(json.contains("\"isNewSession\":true"));
        assert!(json.contains("\"clientId\":\"c-9\""));
        assert!(json.contains("\"flowId\":\"trial\""));
        assert!(json.contains("\"lastActivityAt\""));
    }
}
