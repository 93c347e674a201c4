//! Configuration types for the chatbot broker.
//!
//! `AppConfig` is the top-level `config.toml`. Every section is optional and
//! falls back to its defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::llm::CompletionOptions;
use crate::rate::{RateLimitConfig, RateWindow};

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelConfig,

    /// Optional request hints for chat completions.
    #[serde(default)]
    pub completion: CompletionOptions,

    #[serde(default)]
    pub budget: BudgetConfig,

    /// Windows per limiter dimension. Dimensions not listed are unconstrained.
    #[serde(default = "default_rate_limits")]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub judge: JudgeConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    /// Pricing overrides, checked before the built-in table.
    #[serde(default)]
    pub pricing: Vec<ModelPricing>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            completion: CompletionOptions::default(),
            budget: BudgetConfig::default(),
            rate_limits: default_rate_limits(),
            context: ContextConfig::default(),
            judge: JudgeConfig::default(),
            moderation: ModerationConfig::default(),
            provider: ProviderConfig::default(),
            pricing: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_rate_limits() -> RateLimitConfig {
    BTreeMap::from([
        ("user".to_string(), vec![RateWindow::new(60.0, 6)]),
        ("channel".to_string(), vec![RateWindow::new(60.0, 20)]),
    ])
}

/// Model identifiers per feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_chat_model")]
    pub chat: String,
    #[serde(default = "default_judge_model")]
    pub judge: String,
    #[serde(default = "default_moderation_model")]
    pub moderation: String,
}

fn default_chat_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_judge_model() -> String {
    "gpt-5-nano".to_string()
}

fn default_moderation_model() -> String {
    "omni-moderation-latest".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_model(),
            judge: default_judge_model(),
            moderation: default_moderation_model(),
        }
    }
}

/// Base budget configuration, copied into each per-bot ledger on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default)]
    pub daily_usd: Option<f64>,
    #[serde(default)]
    pub monthly_usd: Option<f64>,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,
    #[serde(default = "default_hard_stop")]
    pub hard_stop: bool,
}

pub fn default_thresholds() -> Vec<f64> {
    vec![0.5, 0.8, 1.0]
}

pub fn default_hard_stop() -> bool {
    true
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_usd: None,
            monthly_usd: None,
            thresholds: default_thresholds(),
            hard_stop: default_hard_stop(),
        }
    }
}

/// How much channel history is retained and sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Stored messages per channel; older ones are trimmed.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Messages of history included in each request.
    #[serde(default = "default_include_last_n")]
    pub include_last_n: usize,
    /// Include user messages that were not addressed to the bot.
    #[serde(default = "default_true")]
    pub include_non_addressed: bool,
}

fn default_max_messages() -> usize {
    50
}

fn default_include_last_n() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            include_last_n: default_include_last_n(),
            include_non_addressed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Minimum confidence for an intervention.
    #[serde(default = "default_judge_threshold")]
    pub threshold: f64,
}

fn default_judge_threshold() -> f64 {
    0.6
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            threshold: default_judge_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Moderate user text before each chat turn.
    #[serde(default)]
    pub enabled: bool,
}

/// HTTP settings for the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Cost information for a model prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Prefix matched against the model name (e.g. `"gpt-5-mini"`).
    pub model_pattern: String,
    /// Cost per million input tokens in USD.
    pub input_cost_per_million: f64,
    /// Cost per million cached input tokens; defaults to the input rate.
    #[serde(default)]
    pub cached_input_cost_per_million: Option<f64>,
    /// Cost per million output tokens in USD.
    pub output_cost_per_million: f64,
}

/// Logging defaults; CLI flags and `LLM_*` env vars take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    /// `text` or `json`.
    #[serde(default)]
    pub format: Option<String>,
    /// Per-target levels, `target=LEVEL[,target=LEVEL...]`.
    #[serde(default)]
    pub levels: Option<String>,
    #[serde(default)]
    pub trace_openai: Option<TraceMode>,
    #[serde(default)]
    pub otel: bool,
}

/// How much of each outbound provider call is traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TraceMode {
    Off,
    #[default]
    Meta,
    Full,
}

impl TraceMode {
    /// Parse a mode name. Anything unrecognized is `Meta`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "off" => TraceMode::Off,
            "full" => TraceMode::Full,
            _ => TraceMode::Meta,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraceMode::Off => "off",
            TraceMode::Meta => "meta",
            TraceMode::Full => "full",
        }
    }
}

impl From<String> for TraceMode {
    fn from(s: String) -> Self {
        TraceMode::parse_lenient(&s)
    }
}

impl fmt::Display for TraceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ReasoningEffort;

    #[test]
    fn test_app_config_empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.models.chat, "gpt-5-mini");
        assert_eq!(config.models.judge, "gpt-5-nano");
        assert_eq!(config.budget.thresholds, vec![0.5, 0.8, 1.0]);
        assert!(config.budget.hard_stop);
        assert!(config.budget.daily_usd.is_none());
        assert_eq!(config.context.max_messages, 50);
        assert!(config.context.include_non_addressed);
        assert!(config.rate_limits.contains_key("user"));
        assert!(!config.moderation.enabled);
        assert!(config.pricing.is_empty());
        assert_eq!(config.provider.timeout_secs, 60);
    }

    #[test]
    fn test_app_config_with_values() {
        let config: AppConfig = toml::from_str(
            r#"
[models]
chat = "gpt-5"

[completion]
reasoning = "minimal"
verbosity = "low"
truncation = "auto"

[budget]
daily_usd = 2.5
monthly_usd = 40.0
thresholds = [0.75]
hard_stop = false

[rate_limits]
guild = [{ window_seconds = 10.0, max_events = 3 }]

[context]
include_last_n = 4
include_non_addressed = false

[moderation]
enabled = true

[[pricing]]
model_pattern = "gpt-5"
input_cost_per_million = 1.0
output_cost_per_million = 8.0

[logging]
format = "json"
trace_openai = "full"
"#,
        )
        .unwrap();
        assert_eq!(config.models.chat, "gpt-5");
        assert_eq!(config.models.judge, "gpt-5-nano");
        assert_eq!(config.completion.reasoning, Some(ReasoningEffort::Minimal));
        assert_eq!(config.budget.daily_usd, Some(2.5));
        assert!(!config.budget.hard_stop);
        assert_eq!(config.budget.thresholds, vec![0.75]);
        assert!(!config.rate_limits.contains_key("user"));
        assert_eq!(config.rate_limits["guild"][0].max_events, 3);
        assert_eq!(config.context.include_last_n, 4);
        assert_eq!(config.context.max_messages, 50);
        assert!(config.moderation.enabled);
        assert!(config.pricing[0].cached_input_cost_per_million.is_none());
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.logging.trace_openai, Some(TraceMode::Full));
    }

    #[test]
    fn test_trace_mode_lenient() {
        assert_eq!(TraceMode::parse_lenient("OFF"), TraceMode::Off);
        assert_eq!(TraceMode::parse_lenient("full"), TraceMode::Full);
        assert_eq!(TraceMode::parse_lenient("verbose"), TraceMode::Meta);
        assert_eq!(TraceMode::default(), TraceMode::Meta);

        let parsed: TraceMode = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(parsed, TraceMode::Meta);
    }
}
