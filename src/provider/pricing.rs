//! Model pricing for cost estimates.
//!
//! Rates are blended input/output USD per 1K tokens. Lookup is by the
//! longest matching model-name prefix, falling back to a per-vendor rate.

use super::config::ProviderKind;

/// Known model prefixes and their blended rate.
const MODEL_RATES: &[(ProviderKind, &str, f64)] = &[
    (ProviderKind::OpenAi, "gpt-4o-mini", 0.000_375),
    (ProviderKind::OpenAi, "gpt-4o", 0.006_25),
    (ProviderKind::OpenAi, "gpt-4.1-mini", 0.001),
    (ProviderKind::OpenAi, "gpt-4.1", 0.005),
    (ProviderKind::OpenAi, "gpt-3.5-turbo", 0.001),
    (ProviderKind::Anthropic, "claude-3-5-haiku", 0.002_4),
    (ProviderKind::Anthropic, "claude-3-haiku", 0.000_75),
    (ProviderKind::Anthropic, "claude-3-5-sonnet", 0.009),
    (ProviderKind::Anthropic, "claude-sonnet", 0.009),
    (ProviderKind::Anthropic, "claude-3-opus", 0.045),
    (ProviderKind::Gemini, "gemini-1.5-flash", 0.000_187_5),
    (ProviderKind::Gemini, "gemini-2.0-flash", 0.000_25),
    (ProviderKind::Gemini, "gemini-1.5-pro", 0.003_125),
];

/// Rate used for models missing from the table.
const fn default_rate(kind: ProviderKind) -> f64 {
    match kind {
        ProviderKind::OpenAi => 0.002,
        ProviderKind::Anthropic => 0.009,
        ProviderKind::Gemini => 0.001,
    }
}

/// Blended USD rate per 1K tokens for a model.
#[must_use]
pub fn rate_per_1k(kind: ProviderKind, model: &str) -> f64 {
    let model = model.trim().to_ascii_lowercase();
    MODEL_RATES
        .iter()
        .filter(|(k, prefix, _)| *k == kind && model.starts_with(prefix))
        .max_by_key(|(_, prefix, _)| prefix.len())
        .map_or_else(|| default_rate(kind), |(_, _, rate)| *rate)
}

/// Estimated USD cost of `tokens` tokens.
#[must_use]
pub fn estimate(kind: ProviderKind, model: &str, tokens: u32) -> f64 {
    f64::from(tokens) / 1000.0 * rate_per_1k(kind, model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        assert!((rate_per_1k(ProviderKind::OpenAi, "gpt-4o-mini-2024-07-18") - 0.000_375).abs() < 1e-12);
        assert!((rate_per_1k(ProviderKind::OpenAi, "gpt-4o-2024-08-06") - 0.006_25).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_uses_vendor_rate() {
        assert!((rate_per_1k(ProviderKind::Gemini, "gemini-ultra") - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_scales_with_tokens() {
        let cost = estimate(ProviderKind::Anthropic, "claude-3-opus-20240229", 2000);
        assert!((cost - 0.09).abs() < 1e-9);
        assert!(estimate(ProviderKind::OpenAi, "gpt-4o", 0).abs() < f64::EPSILON);
    }
}
