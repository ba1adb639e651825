//! Keyword rule matching.
//!
//! Rules are compiled once when the matcher is built; regex keywords that
//! fail to compile are kept as permanent non-matches so the rule's other
//! keywords still work.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::core::{KeywordRule, MatchType, ResponseType};

/// One keyword, ready to test.
#[derive(Debug, Clone)]
enum Pattern {
    /// Literal keyword, already case-folded when the rule is case-insensitive.
    Literal(String),
    /// Compiled regular expression.
    Regex(Regex),
    /// Regex that failed to compile.
    Invalid,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: KeywordRule,
    patterns: Vec<Pattern>,
}

impl CompiledRule {
    fn compile(rule: KeywordRule) -> Self {
        let patterns = rule
            .keywords
            .iter()
            .map(|keyword| match rule.match_type {
                MatchType::Regex => RegexBuilder::new(keyword)
                    .case_insensitive(!rule.case_sensitive)
                    .build()
                    .map_or_else(
                        |err| {
                            warn!(rule_id = %rule.id, pattern = %keyword, error = %err, "invalid regex keyword ignored");
                            Pattern::Invalid
                        },
                        Pattern::Regex,
                    ),
                _ if rule.case_sensitive => Pattern::Literal(keyword.trim().to_string()),
                _ => Pattern::Literal(keyword.trim().to_lowercase()),
            })
            .collect();
        Self { rule, patterns }
    }

    fn matches(&self, raw: &str, folded: &str) -> bool {
        let text = if self.rule.case_sensitive { raw } else { folded };
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Invalid => false,
            Pattern::Regex(re) => re.is_match(raw),
            Pattern::Literal(keyword) if keyword.is_empty() => false,
            Pattern::Literal(keyword) => match self.rule.match_type {
                MatchType::Exact => text.trim() == keyword,
                MatchType::Contains => text.contains(keyword.as_str()),
                MatchType::StartsWith => text.trim_start().starts_with(keyword.as_str()),
                MatchType::Regex => false,
            },
        })
    }
}

/// Matches free text against a prioritized rule set.
///
/// The rule set is immutable; build a new matcher to reload rules.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    rules: Vec<CompiledRule>,
}

impl KeywordMatcher {
    /// Builds a matcher over `rules`, keeping their load order.
    #[must_use]
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self {
            rules: rules.into_iter().map(CompiledRule::compile).collect(),
        }
    }

    /// Number of loaded rules, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the winning rule of `response_type` for `text`, if any.
    ///
    /// The highest priority wins; on a tie the earlier-loaded rule wins.
    #[must_use]
    pub fn match_rule(&self, text: &str, response_type: ResponseType) -> Option<&KeywordRule> {
        let folded = text.to_lowercase();
        let mut best: Option<&KeywordRule> = None;

        for compiled in &self.rules {
            let rule = &compiled.rule;
            if !rule.enabled || rule.response_type != response_type {
                continue;
            }
            if best.is_some_and(|b| rule.priority <= b.priority) {
                continue;
            }
            if compiled.matches(text, &folded) {
                best = Some(rule);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn matcher(rules: Vec<KeywordRule>) -> KeywordMatcher {
        KeywordMatcher::new(rules)
    }

    #[test_case(MatchType::Exact, "hola", "Hola", true; "exact folds case")]
    #[test_case(MatchType::Exact, "hola", "hola amigo", false; "exact needs whole string")]
    #[test_case(MatchType::Contains, "precio", "¿Cuál es el PRECIO?", true; "contains")]
    #[test_case(MatchType::Contains, "precio", "tarifas", false; "contains miss")]
    #[test_case(MatchType::StartsWith, "info", "Info por favor", true; "starts with")]
    #[test_case(MatchType::StartsWith, "info", "quiero info", false; "starts with miss")]
    #[test_case(MatchType::Regex, r"^hor(a|ario)s?\b", "Horarios de hoy", true; "regex case insensitive")]
    #[test_case(MatchType::Regex, r"\d{3}", "sin números", false; "regex miss")]
    fn test_match_types(match_type: MatchType, keyword: &str, text: &str, expected: bool) {
        let m = matcher(vec![KeywordRule::text("r", &[keyword], "ok").with_match_type(match_type)]);
        assert_eq!(m.match_rule(text, ResponseType::Text).is_some(), expected);
    }

    #[test]
    fn test_case_sensitive_rule() {
        let m = matcher(vec![KeywordRule::text("r", &["VIP"], "ok").case_sensitive(true)]);
        assert!(m.match_rule("soy VIP", ResponseType::Text).is_some());
        assert!(m.match_rule("soy vip", ResponseType::Text).is_none());

        let re = matcher(vec![
            KeywordRule::text("r", &["^VIP"], "ok")
                .with_match_type(MatchType::Regex)
                .case_sensitive(true),
        ]);
        assert!(re.match_rule("vip", ResponseType::Text).is_none());
    }

    #[test]
    fn test_highest_priority_wins() {
        let m = matcher(vec![
            KeywordRule::text("low", &["clase"], "low").with_priority(1),
            KeywordRule::text("high", &["clase"], "high").with_priority(5),
            KeywordRule::text("mid", &["clase"], "mid").with_priority(3),
        ]);
        let rule = m.match_rule("clase de spinning", ResponseType::Text);
        assert_eq!(rule.map(|r| r.id.as_str()), Some("high"));
    }

    #[test]
    fn test_equal_priority_keeps_first_loaded() {
        let m = matcher(vec![
            KeywordRule::text("first", &["hola"], "1").with_priority(2),
            KeywordRule::text("second", &["hola"], "2").with_priority(2),
        ]);
        let rule = m.match_rule("hola", ResponseType::Text);
        assert_eq!(rule.map(|r| r.id.as_str()), Some("first"));
    }

    #[test]
    fn test_filters_disabled_and_other_types() {
        let m = matcher(vec![
            KeywordRule::text("off", &["hola"], "off").enabled(false),
            KeywordRule::text("transfer", &["hola"], "t").with_response_type(ResponseType::Transfer),
        ]);
        assert!(m.match_rule("hola", ResponseType::Text).is_none());
        assert_eq!(
            m.match_rule("hola", ResponseType::Transfer).map(|r| r.id.as_str()),
            Some("transfer")
        );
    }

    #[test]
    fn test_malformed_regex_only_disables_that_keyword() {
        let m = matcher(vec![
            KeywordRule::text("r", &["(unclosed", "precio"], "ok").with_match_type(MatchType::Regex),
        ]);
        assert!(m.match_rule("(unclosed", ResponseType::Text).is_none());
        assert!(m.match_rule("el precio", ResponseType::Text).is_some());
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let m = matcher(vec![KeywordRule::text("r", &["  "], "ok")]);
        assert!(m.match_rule("anything", ResponseType::Text).is_none());
    }

    proptest! {
        #[test]
        fn test_winner_has_max_priority(priorities in prop::collection::vec(-50i64..50, 1..12)) {
            let rules: Vec<KeywordRule> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| KeywordRule::text(format!("r{i}"), &["hola"], "x").with_priority(*p))
                .collect();
            let max = priorities.iter().copied().max().unwrap_or_default();
            let first_max = priorities.iter().position(|p| *p == max).unwrap_or_default();

            let m = matcher(rules);
            let winner = m.match_rule("hola", ResponseType::Text);
            let expected = format!("r{first_max}");
            prop_assert_eq!(winner.map(|r| r.id.as_str()), Some(expected.as_str()));
        }

        #[test]
        fn test_bad_regex_never_panics(pattern in "[()\\[\\]*+?a-z]{1,8}", text in ".{0,20}") {
            let m = matcher(vec![KeywordRule::text("r", &[pattern.as_str()], "x").with_match_type(MatchType::Regex)]);
            let _ = m.match_rule(&text, ResponseType::Text);
        }
    }
}
