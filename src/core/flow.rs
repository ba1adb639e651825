//! Guided conversation flow definitions.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Kind of a flow step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStepType {
    /// Free-text question.
    #[default]
    Question,
    /// Question answered by choosing one of the step's options.
    Options,
    /// Informational message; any reply moves on.
    Message,
}

/// A selectable answer on an options step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOption {
    /// Text shown to the user.
    pub label: String,
    /// Value recorded when chosen. Defaults to the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Step to jump to when chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

impl FlowOption {
    /// Value recorded for this option.
    #[must_use]
    pub fn recorded_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    /// Step identifier, unique within the flow.
    pub id: String,
    /// Step kind.
    #[serde(default, rename = "type")]
    pub step_type: FlowStepType,
    /// Prompt sent when the step is entered.
    pub content: String,
    /// Branching answers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FlowOption>,
    /// Explicit successor. Falls back to the next step in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

impl FlowStep {
    /// Creates a free-text question step.
    #[must_use]
    pub fn question(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_type: FlowStepType::Question,
            content: content.into(),
            options: Vec::new(),
            next_step_id: None,
        }
    }

    /// Prompt text including a numbered option list when present.
    #[must_use]
    pub fn prompt(&self) -> String {
        if self.options.is_empty() {
            return self.content.clone();
        }
        let mut text = self.content.clone();
        for (i, option) in self.options.iter().enumerate() {
            let _ = write!(text, "\n{}. {}", i + 1, option.label);
        }
        text
    }
}

/// A predefined multi-step dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFlow {
    /// Flow identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Phrases that start the flow.
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    /// Ordered steps; the first one is the entry point.
    pub steps: Vec<FlowStep>,
    /// Closing line sent when the flow completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_message: Option<String>,
    /// Disabled flows are never triggered.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl ConversationFlow {
    /// Looks up a step by id.
    #[must_use]
    pub fn step(&self, step_id: &str) -> Option<&FlowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Entry step.
    #[must_use]
    pub fn first_step(&self) -> Option<&FlowStep> {
        self.steps.first()
    }

    /// Step following `step_id` in declaration order.
    #[must_use]
    pub fn step_after(&self, step_id: &str) -> Option<&FlowStep> {
        let index = self.steps.iter().position(|s| s.id == step_id)?;
        self.steps.get(index + 1)
    }

    /// Whether any trigger keyword appears in `text` (case-insensitive).
    #[must_use]
    pub fn is_triggered_by(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.trigger_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k))
    }
}
