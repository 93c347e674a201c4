//! Cost estimation for LLM calls.
//!
//! Provides a hardcoded default pricing table for known models with user
//! override capability from `config.toml`. Cached input tokens are billed at
//! their own rate. Cost estimates are clearly labeled as approximate (`~$0.12`).

use chatbot_types::config::ModelPricing;
use chatbot_types::llm::Usage;

/// Internal pricing entry for the hardcoded default table.
struct PricingEntry {
    model_pattern: &'static str,
    input_cost_per_million: f64,
    cached_input_cost_per_million: f64,
    output_cost_per_million: f64,
}

/// Conservative fallback pricing when no model match is found.
const FALLBACK_INPUT_COST: f64 = 5.0;
const FALLBACK_OUTPUT_COST: f64 = 15.0;

/// Return the hardcoded default pricing table, most specific prefix first.
///
/// Prices are approximate and expressed in USD per million tokens.
fn default_pricing_table() -> Vec<PricingEntry> {
    vec![
        PricingEntry {
            model_pattern: "gpt-5-nano",
            input_cost_per_million: 0.05,
            cached_input_cost_per_million: 0.005,
            output_cost_per_million: 0.40,
        },
        PricingEntry {
            model_pattern: "gpt-5-mini",
            input_cost_per_million: 0.25,
            cached_input_cost_per_million: 0.025,
            output_cost_per_million: 2.0,
        },
        PricingEntry {
            model_pattern: "gpt-5",
            input_cost_per_million: 1.25,
            cached_input_cost_per_million: 0.125,
            output_cost_per_million: 10.0,
        },
        PricingEntry {
            model_pattern: "gpt-4.1-nano",
            input_cost_per_million: 0.10,
            cached_input_cost_per_million: 0.025,
            output_cost_per_million: 0.40,
        },
        PricingEntry {
            model_pattern: "gpt-4.1-mini",
            input_cost_per_million: 0.40,
            cached_input_cost_per_million: 0.10,
            output_cost_per_million: 1.60,
        },
        PricingEntry {
            model_pattern: "gpt-4.1",
            input_cost_per_million: 2.0,
            cached_input_cost_per_million: 0.50,
            output_cost_per_million: 8.0,
        },
        PricingEntry {
            model_pattern: "gpt-4o-mini",
            input_cost_per_million: 0.15,
            cached_input_cost_per_million: 0.075,
            output_cost_per_million: 0.60,
        },
        PricingEntry {
            model_pattern: "gpt-4o",
            input_cost_per_million: 2.50,
            cached_input_cost_per_million: 1.25,
            output_cost_per_million: 10.0,
        },
        // Moderation is free
        PricingEntry {
            model_pattern: "omni-moderation",
            input_cost_per_million: 0.0,
            cached_input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
        },
    ]
}

/// Case-insensitive prefix match: `"gpt-5-mini"` matches `"gpt-5-mini-2025-08-07"`.
fn matches_pattern(model: &str, pattern: &str) -> bool {
    model.to_lowercase().starts_with(&pattern.to_lowercase())
}

/// Estimate the cost of a call in USD.
///
/// Lookup order:
/// 1. User-defined pricing overrides from `config.toml`
/// 2. Hardcoded default pricing table
/// 3. Conservative fallback ($5.00 / $15.00 per million tokens)
pub fn estimate_cost(usage: &Usage, model: &str, user_pricing: &[ModelPricing]) -> f64 {
    // 1. Check user overrides first
    if let Some(pricing) = user_pricing
        .iter()
        .find(|p| matches_pattern(model, &p.model_pattern))
    {
        return compute_cost(
            usage,
            pricing.input_cost_per_million,
            pricing
                .cached_input_cost_per_million
                .unwrap_or(pricing.input_cost_per_million),
            pricing.output_cost_per_million,
        );
    }

    // 2. Check default pricing table
    if let Some(entry) = default_pricing_table()
        .iter()
        .find(|e| matches_pattern(model, e.model_pattern))
    {
        return compute_cost(
            usage,
            entry.input_cost_per_million,
            entry.cached_input_cost_per_million,
            entry.output_cost_per_million,
        );
    }

    // 3. Conservative fallback
    tracing::debug!(model, "No pricing entry for model, using fallback rates");
    compute_cost(
        usage,
        FALLBACK_INPUT_COST,
        FALLBACK_INPUT_COST,
        FALLBACK_OUTPUT_COST,
    )
}

/// Compute cost in USD given token counts and per-million rates.
///
/// Cached tokens are a subset of input tokens and are never billed twice.
fn compute_cost(
    usage: &Usage,
    input_cost_per_million: f64,
    cached_input_cost_per_million: f64,
    output_cost_per_million: f64,
) -> f64 {
    let cached = usage.cached_input_tokens.min(usage.input_tokens);
    let uncached = usage.input_tokens - cached;
    let input_cost = (uncached as f64 / 1_000_000.0) * input_cost_per_million;
    let cached_cost = (cached as f64 / 1_000_000.0) * cached_input_cost_per_million;
    let output_cost = (usage.output_tokens as f64 / 1_000_000.0) * output_cost_per_million;
    input_cost + cached_cost + output_cost
}

/// Format a cost estimate as a human-readable string.
///
/// Always prefixed with `~` to indicate the value is an estimate.
/// - Costs below $0.01 use 3 decimal places: `~$0.001`
/// - Costs $0.01 and above use 2 decimal places: `~$0.12`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}
