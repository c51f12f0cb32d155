//! Model pricing and reasoning-token multipliers.
//!
//! Rates are USD per million tokens. Lookups normalize the model name
//! (strip any `"<provider>/"` prefix), try an exact match, then strip a
//! trailing dated suffix (`-YYYY-MM-DD` and anything after it) and retry
//! against the base family. An unknown model prices at zero and
//! multiplies at 1; both are deliberate defaults, not errors.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// USD per million tokens, one direction each.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const fn rate(input_per_million: f64, output_per_million: f64) -> PricingRate {
    PricingRate {
        input_per_million,
        output_per_million,
    }
}

/// Published per-million rates for the models the template corpus uses.
const MODEL_PRICING_PER_1M: &[(&str, PricingRate)] = &[
    ("gpt-5.2", rate(1.75, 14.0)),
    ("gpt-5.1", rate(1.25, 10.0)),
    ("gpt-5", rate(1.25, 10.0)),
    ("gpt-5-mini", rate(0.25, 2.0)),
    ("gpt-5-nano", rate(0.05, 0.4)),
    ("gpt-4.1", rate(2.0, 8.0)),
    ("gpt-4.1-mini", rate(0.4, 1.6)),
    ("gpt-4.1-nano", rate(0.1, 0.4)),
    ("gpt-4o", rate(2.5, 10.0)),
    ("gpt-4o-mini", rate(0.15, 0.6)),
    ("o1", rate(15.0, 60.0)),
    ("o3", rate(2.0, 8.0)),
    ("o4-mini", rate(1.1, 4.4)),
    ("chatgpt-4o-latest", rate(5.0, 15.0)),
];

/// Approximate factor by which reasoning models inflate billed completion
/// tokens over the visible answer. Rough by nature; good enough for
/// budgeting.
const REASONING_MULTIPLIERS: &[(&str, f64)] = &[
    ("gpt-5.2", 2.0),
    ("gpt-5.1", 2.0),
    ("gpt-5", 2.0),
    ("gpt-5-mini", 2.0),
    ("gpt-5-nano", 2.0),
    ("o1", 4.0),
    ("o3", 3.0),
    ("o4-mini", 3.0),
];

static DATED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{4}-\d{2}-\d{2}.*$").expect("static pattern"));

/// Strip a `"<provider>/"` prefix (e.g. `openai/gpt-5` → `gpt-5`) and
/// surrounding whitespace.
pub fn normalize_model(model: &str) -> &str {
    let trimmed = model.trim();
    match trimmed.rsplit_once('/') {
        Some((_, name)) => name,
        None => trimmed,
    }
}

/// Exact match, then dated-suffix-stripped family match.
fn lookup<T: Copy>(table: &[(&str, T)], normalized: &str) -> Option<T> {
    let exact = table
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, value)| *value);
    if exact.is_some() {
        return exact;
    }

    let family = DATED_SUFFIX.replace(normalized, "");
    table
        .iter()
        .find(|(name, _)| *name == family.as_ref())
        .map(|(_, value)| *value)
}

/// Pricing rate for a model; zero in both directions when unknown.
pub fn pricing_rate(model: &str) -> PricingRate {
    lookup(MODEL_PRICING_PER_1M, normalize_model(model)).unwrap_or(rate(0.0, 0.0))
}

/// Estimated USD cost for a token pair, rounded to 6 decimal places.
/// A non-finite result reports as 0.
pub fn estimate_cost_usd(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let rate = pricing_rate(model);
    let cost = (prompt_tokens as f64 / 1_000_000.0) * rate.input_per_million
        + (completion_tokens as f64 / 1_000_000.0) * rate.output_per_million;
    if cost.is_finite() {
        round6(cost)
    } else {
        0.0
    }
}

/// Reasoning-token inflation factor for a model, default 1.
pub fn reasoning_multiplier(model: &str) -> f64 {
    lookup(REASONING_MULTIPLIERS, normalize_model(model)).unwrap_or(1.0)
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_strips_provider_prefix() {
        assert_eq!(normalize_model("openai/gpt-5"), "gpt-5");
        assert_eq!(normalize_model("azure/openai/gpt-4o"), "gpt-4o");
        assert_eq!(normalize_model(" gpt-5 "), "gpt-5");
        assert_eq!(normalize_model("gpt-5"), "gpt-5");
        assert_eq!(normalize_model(""), "");
    }

    #[test]
    fn test_gpt5_per_million_rates() {
        assert!(approx_eq(estimate_cost_usd("gpt-5", 1_000_000, 0), 1.25));
        assert!(approx_eq(estimate_cost_usd("gpt-5", 0, 1_000_000), 10.0));
    }

    #[test]
    fn test_unknown_model_costs_zero() {
        assert!(approx_eq(estimate_cost_usd("unknown-model", 1000, 1000), 0.0));
    }

    #[test]
    fn test_dated_suffix_falls_back_to_family() {
        // gpt-4o-2024-05-13 prices as gpt-4o.
        assert!(approx_eq(
            estimate_cost_usd("gpt-4o-2024-05-13", 1_000_000, 0),
            2.5
        ));
        assert!(approx_eq(
            estimate_cost_usd("gpt-4o-2024-05-13", 0, 1_000_000),
            estimate_cost_usd("gpt-4o", 0, 1_000_000)
        ));
    }

    #[test]
    fn test_exact_match_wins_over_family() {
        // gpt-4o-mini is its own row, not the gpt-4o family.
        assert!(approx_eq(
            estimate_cost_usd("gpt-4o-mini", 1_000_000, 0),
            0.15
        ));
    }

    #[test]
    fn test_non_date_suffix_does_not_fall_back() {
        // Only -YYYY-MM-DD suffixes are stripped; a "-preview" tag misses.
        assert!(approx_eq(estimate_cost_usd("gpt-4o-preview", 1_000_000, 0), 0.0));
    }

    #[test]
    fn test_cost_is_rounded_to_six_decimals() {
        // 7 tokens of gpt-5 input: 7/1e6 * 1.25 = 0.00000875 → 0.000009
        assert!(approx_eq(estimate_cost_usd("gpt-5", 7, 0), 0.000009));
        assert!(approx_eq(estimate_cost_usd("gpt-5", 0, 0), 0.0));
    }

    #[test]
    fn test_provider_prefix_in_cost_lookup() {
        assert!(approx_eq(
            estimate_cost_usd("openai/gpt-5", 1_000_000, 0),
            1.25
        ));
    }

    #[test]
    fn test_reasoning_multiplier_chain() {
        assert!(approx_eq(reasoning_multiplier("o1"), 4.0));
        assert!(approx_eq(reasoning_multiplier("openai/o1"), 4.0));
        assert!(approx_eq(reasoning_multiplier("o1-2024-12-17"), 4.0));
        assert!(approx_eq(reasoning_multiplier("gpt-5"), 2.0));
        assert!(approx_eq(reasoning_multiplier("gpt-4o"), 1.0));
        assert!(approx_eq(reasoning_multiplier("unknown"), 1.0));
    }
}
