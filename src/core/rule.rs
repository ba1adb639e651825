//! Keyword rule definitions.

use serde::{Deserialize, Serialize};

/// How a rule keyword is compared against the incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Whole message equals the keyword.
    Exact,
    /// Keyword appears anywhere in the message.
    Contains,
    /// Message begins with the keyword.
    StartsWith,
    /// Keyword is a regular expression.
    Regex,
}

impl MatchType {
    /// Parses a match type name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "contains" => Some(Self::Contains),
            "starts_with" | "startswith" => Some(Self::StartsWith),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Regex => "regex",
        }
    }
}

/// What a matched rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Reply with the rule's text.
    Text,
    /// Reply with the rule's text and hand the chat to a human.
    Transfer,
    /// Start the flow whose id is the rule's payload.
    Flow,
}

impl ResponseType {
    /// Parses a response type name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "transfer" => Some(Self::Transfer),
            "flow" => Some(Self::Flow),
            _ => None,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Transfer => "transfer",
            Self::Flow => "flow",
        }
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prioritized pattern-to-response mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRule {
    /// Rule identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Keywords, evaluated in order.
    pub keywords: Vec<String>,
    /// Comparison used for every keyword.
    pub match_type: MatchType,
    /// What a hit does.
    pub response_type: ResponseType,
    /// Reply text, or flow id for [`ResponseType::Flow`].
    pub response: String,
    /// Higher wins.
    #[serde(default)]
    pub priority: i64,
    /// Disabled rules never match.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Compare without folding case.
    #[serde(default)]
    pub case_sensitive: bool,
}

const fn default_true() -> bool {
    true
}

impl KeywordRule {
    /// Creates an enabled, case-insensitive `contains` text rule.
    #[must_use]
    pub fn text(id: impl Into<String>, keywords: &[&str], response: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            match_type: MatchType::Contains,
            response_type: ResponseType::Text,
            response: response.into(),
            priority: 0,
            enabled: true,
            case_sensitive: false,
        }
    }

    /// Sets the match type.
    #[must_use]
    pub const fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    /// Sets the response type.
    #[must_use]
    pub const fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Sets case sensitivity.
    #[must_use]
    pub const fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Enables or disables the rule.
    #[must_use]
    pub const fn enabled(mut self, yes: bool) -> Self {
        self.enabled = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_parse() {
        assert_eq!(MatchType::parse("EXACT"), Some(MatchType::Exact));
        assert_eq!(MatchType::parse("starts_with"), Some(MatchType::StartsWith));
        assert_eq!(MatchType::parse("regex"), Some(MatchType::Regex));
        assert_eq!(MatchType::parse("fuzzy"), None);
    }

    #[test]
    fn test_rule_deserialize_defaults() {
        let json = r#"{
            "id": "r1",
            "name": "Horario",
            "keywords": ["horario"],
            "matchType": "contains",
            "responseType": "text",
            "response": "Abrimos de 7 a 22h"
        }"#;
        let rule: KeywordRule =
            serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert!(rule.enabled);
        assert!(!rule.case_sensitive);
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.match_type, MatchType::Contains);
    }

    #[test]
    fn test_rule_serialize_snake_case_enums() {
        let rule = KeywordRule::text("r1", &["hola"], "Hola!")
            .with_match_type(MatchType::StartsWith)
            .with_response_type(ResponseType::Transfer);
        let json = serde_json::to_string(&rule).unwrap_or_default();
        assert!(json.contains("\"matchType\":\"starts_with\""));
        assert!(json.contains("\"responseType\":\"transfer\""));
    }
}
