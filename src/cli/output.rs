//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::core::{AgentResponse, ConversationFlow, KeywordRule};
use crate::storage::KnowledgeHit;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognized is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let mut json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
        json.push('\n');
        json
    }
}

/// Formats the rule listing.
#[must_use]
pub fn format_rules(rules: &[KeywordRule], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(rules);
    }
    if rules.is_empty() {
        return "No rules defined.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<8} {:<12} {:<9} {:>4}  KEYWORDS",
        "ID", "TYPE", "MATCH", "ENABLED", "PRIO"
    );
    for rule in rules {
        let _ = writeln!(
            out,
            "{:<16} {:<8} {:<12} {:<9} {:>4}  {}",
            truncate(&rule.id, 16),
            rule.response_type.as_str(),
            rule.match_type.as_str(),
            if rule.enabled { "yes" } else { "no" },
            rule.priority,
            rule.keywords.join(", ")
        );
    }
    out
}

/// Formats the flow listing.
#[must_use]
pub fn format_flows(flows: &[ConversationFlow], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(flows);
    }
    if flows.is_empty() {
        return "No flows defined.\n".to_string();
    }

    let mut out = String::new();
    for flow in flows {
        let _ = writeln!(
            out,
            "{} ({}) - {} steps{}",
            flow.id,
            flow.name,
            flow.steps.len(),
            if flow.enabled { "" } else { " [disabled]" }
        );
        if !flow.trigger_keywords.is_empty() {
            let _ = writeln!(out, "  triggers: {}", flow.trigger_keywords.join(", "));
        }
    }
    out
}

/// Formats knowledge search results.
#[must_use]
pub fn format_hits(keywords: &[String], hits: &[KnowledgeHit], format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(&serde_json::json!({
            "keywords": keywords,
            "results": hits,
        }));
    }
    if keywords.is_empty() {
        return "No searchable keywords in query.\n".to_string();
    }
    if hits.is_empty() {
        return format!("No results for: {}\n", keywords.join(" "));
    }

    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(
            out,
            "[{:.3}] {}: {}",
            hit.score,
            hit.title,
            truncate(&hit.content, 120)
        );
    }
    out
}

/// Formats an engine reply.
#[must_use]
pub fn format_response(response: &AgentResponse, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format.to_json(response);
    }
    let mut out = String::new();
    if response.message.is_empty() {
        if let Some(code) = response.error {
            let _ = writeln!(out, "[{}]", code.as_str());
        }
    } else {
        let _ = writeln!(out, "{}", response.message);
    }
    if response.is_transfer() {
        out.push_str("[transfer to staff]\n");
    }
    out
}

/// Truncates to `max_len` characters, adding `...` when cut.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let mut cut: String = s.chars().take(max_len - 3).collect();
    cut.push_str("...");
    cut
}
