//! LLM call types for the chatbot broker.
//!
//! These model the provider-agnostic side of a call: optional request hints,
//! the normalized completion result, the usage triple, judge decisions, and
//! the error taxonomy for transport failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token usage triple extracted from a provider response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Input tokens served from the provider's prompt cache (a subset of `input_tokens`).
    pub cached_input_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64, cached_input_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cached_input_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Reasoning effort hint, only sent to models in a reasoning-capable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(ReasoningEffort::Minimal),
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("invalid reasoning effort: '{other}'")),
        }
    }
}

/// Output verbosity hint, gated like [`ReasoningEffort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Verbosity::Low),
            "medium" => Ok(Verbosity::Medium),
            "high" => Ok(Verbosity::High),
            other => Err(format!("invalid verbosity: '{other}'")),
        }
    }
}

/// Context truncation strategy for the Responses API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    Auto,
    Disabled,
}

/// Optional request parameters for a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningEffort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
}

/// Normalized result of a successful completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
    /// Model that produced the completion.
    pub model: String,
    /// Which request shape succeeded.
    pub path: ApiPath,
    /// Provider-assigned request identifier, when present.
    pub request_id: Option<String>,
}

/// Provider endpoint a call was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiPath {
    /// Primary request shape (typed input items).
    Responses,
    /// Secondary, older request shape (role/content messages).
    ChatCompletions,
    Moderations,
}

impl ApiPath {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiPath::Responses => "responses.create",
            ApiPath::ChatCompletions => "chat.completions.create",
            ApiPath::Moderations => "moderations.create",
        }
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which feature a call serves; carried on trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallPhase {
    Chat,
    Judge,
    JudgeFallback,
    Moderate,
}

impl CallPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CallPhase::Chat => "chat",
            CallPhase::Judge => "judge",
            CallPhase::JudgeFallback => "judge-fallback",
            CallPhase::Moderate => "moderate",
        }
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the judge thinks the bot should speak up.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    #[default]
    Help,
    Joke,
    Snark,
    /// Any intent label the classifier invents.
    Other(String),
}

impl Intent {
    pub fn as_str(&self) -> &str {
        match self {
            Intent::Help => "help",
            Intent::Joke => "joke",
            Intent::Snark => "snark",
            Intent::Other(s) => s,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Intent {
    fn from(s: String) -> Self {
        match s.as_str() {
            "help" => Intent::Help,
            "joke" => Intent::Joke,
            "snark" => Intent::Snark,
            _ => Intent::Other(s),
        }
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.as_str().to_string()
    }
}

/// Terminal decision of the intervention judge.
///
/// The default value is the safe decision: do not intervene, `help`, zero confidence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JudgeDecision {
    pub intervene: bool,
    pub intent: Intent,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Both request shapes failed for a chat completion.
    #[error("request failed on every path: responses.create: {primary}; chat.completions.create: {secondary}")]
    Exhausted {
        primary: Box<LlmError>,
        secondary: Box<LlmError>,
    },
}

impl LlmError {
    /// Short error class, suitable for a span attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Provider { .. } => "provider",
            LlmError::Http { .. } => "http",
            LlmError::Transport(_) => "transport",
            LlmError::Deserialization(_) => "deserialization",
            LlmError::AuthenticationFailed => "authentication",
            LlmError::RateLimited { .. } => "rate_limited",
            LlmError::Exhausted { .. } => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_default_is_zero() {
        let usage = Usage::default();
        assert_eq!(usage, Usage::new(0, 0, 0));
        assert_eq!(Usage::new(10, 5, 2).total_tokens(), 15);
    }

    #[test]
    fn test_intent_open_set() {
        assert_eq!(Intent::from("joke".to_string()), Intent::Joke);
        let other = Intent::from("lore".to_string());
        assert_eq!(other, Intent::Other("lore".to_string()));
        assert_eq!(other.to_string(), "lore");

        let json = serde_json::to_string(&Intent::Snark).unwrap();
        assert_eq!(json, "\"snark\"");
    }

    #[test]
    fn test_judge_decision_default_is_safe() {
        let d = JudgeDecision::default();
        assert!(!d.intervene);
        assert_eq!(d.intent, Intent::Help);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_api_path_names() {
        assert_eq!(ApiPath::Responses.to_string(), "responses.create");
        assert_eq!(ApiPath::ChatCompletions.to_string(), "chat.completions.create");
        assert_eq!(CallPhase::JudgeFallback.to_string(), "judge-fallback");
    }

    #[test]
    fn test_exhausted_error_mentions_both_attempts() {
        let err = LlmError::Exhausted {
            primary: Box::new(LlmError::Transport("timed out".into())),
            secondary: Box::new(LlmError::Http {
                status: 404,
                body: "model not found".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("model not found"));
    }

    #[test]
    fn test_reasoning_and_verbosity_parse() {
        assert_eq!("Minimal".parse::<ReasoningEffort>().unwrap(), ReasoningEffort::Minimal);
        assert!("extreme".parse::<ReasoningEffort>().is_err());
        assert_eq!("low".parse::<Verbosity>().unwrap(), Verbosity::Low);
    }
}
