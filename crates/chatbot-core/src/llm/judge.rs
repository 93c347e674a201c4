//! Low-cost "should the bot speak up" classifier.
//!
//! The judge never fails: it walks a fixed attempt sequence and ends in a
//! [`JudgeVerdict`] whose status says whether the provider answered, answered
//! with something unparseable, or could not be reached at all.

use serde_json::Value;

use chatbot_types::chat::ChatMessage;
use chatbot_types::llm::{
    ApiPath, CallPhase, CompletionOptions, Intent, JudgeDecision, ReasoningEffort, Usage,
    Verbosity,
};

use super::client::LlmClient;
use super::extract::{extract_text, extract_usage};
use super::payload::{ChatCompletionsRequest, ProviderRequest, ResponsesRequest};
use super::provider::LlmProvider;

/// Model tried last, with the primary request shape, when the configured one fails.
pub const JUDGE_FALLBACK_MODEL: &str = "gpt-5-nano";

/// How many trailing context messages the judge sees.
pub const JUDGE_CONTEXT_MESSAGES: usize = 5;

const JUDGE_INSTRUCTION: &str = "You are a strict classifier for a chat bot. Decide if the bot should \
proactively intervene. Return ONLY compact JSON: \
{\"intervene\": true|false, \"intent\": \"help|joke|snark\", \"confidence\": 0..1}.";

/// How the attempt sequence ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeStatus {
    /// The provider answered with a parseable decision.
    Decided { path: ApiPath, model: String },
    /// The provider answered but the output was not a decision.
    Malformed { path: ApiPath, model: String },
    /// Every attempt failed to reach the provider.
    Unavailable,
}

/// Final judge result. `decision.intervene` already has the threshold applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub decision: JudgeDecision,
    pub status: JudgeStatus,
    /// Usage of the call that answered (zero when unavailable).
    pub usage: Usage,
}

impl JudgeVerdict {
    fn unavailable() -> Self {
        Self {
            decision: JudgeDecision::default(),
            status: JudgeStatus::Unavailable,
            usage: Usage::default(),
        }
    }

    /// Model whose call should be billed, if any call succeeded.
    pub fn billed_model(&self) -> Option<&str> {
        match &self.status {
            JudgeStatus::Decided { model, .. } | JudgeStatus::Malformed { model, .. } => {
                Some(model)
            }
            JudgeStatus::Unavailable => None,
        }
    }
}

impl<P: LlmProvider> LlmClient<P> {
    /// Decide whether the bot should intervene in a conversation.
    ///
    /// Attempts, in order: Responses with `model`, Chat Completions with
    /// `model`, Responses with [`JUDGE_FALLBACK_MODEL`]. The first call that
    /// returns ends the sequence, even if its output does not parse. The
    /// final `intervene` is the parsed flag AND `confidence >= threshold`.
    pub async fn judge(&self, model: &str, context: &[ChatMessage], threshold: f64) -> JudgeVerdict {
        let start = context.len().saturating_sub(JUDGE_CONTEXT_MESSAGES);
        let recent = &context[start..];
        let options = CompletionOptions {
            reasoning: Some(ReasoningEffort::Minimal),
            verbosity: Some(Verbosity::Low),
            truncation: None,
        };

        let mut with_developer = vec![ChatMessage::developer(JUDGE_INSTRUCTION)];
        with_developer.extend_from_slice(recent);
        let mut with_system = vec![ChatMessage::system(JUDGE_INSTRUCTION)];
        with_system.extend_from_slice(recent);

        let attempts = [
            (
                ProviderRequest::Responses(ResponsesRequest::new(model, &with_developer, &options)),
                CallPhase::Judge,
            ),
            (
                ProviderRequest::ChatCompletions(ChatCompletionsRequest::new(model, &with_system)),
                CallPhase::Judge,
            ),
            (
                ProviderRequest::Responses(ResponsesRequest::new(
                    JUDGE_FALLBACK_MODEL,
                    &with_developer,
                    &options,
                )),
                CallPhase::JudgeFallback,
            ),
        ];

        for (request, phase) in &attempts {
            match self.send(request, *phase).await {
                Ok(response) => {
                    if *phase == CallPhase::JudgeFallback {
                        tracing::info!(model = JUDGE_FALLBACK_MODEL, "Judge fallback model used");
                    }
                    return verdict(request, &response, threshold);
                }
                Err(e) => tracing::info!(
                    path = request.path().as_str(),
                    model = request.model(),
                    error = %e,
                    "Judge attempt failed"
                ),
            }
        }

        tracing::warn!(model, "All judge attempts failed, not intervening");
        JudgeVerdict::unavailable()
    }
}

fn verdict(request: &ProviderRequest, response: &Value, threshold: f64) -> JudgeVerdict {
    let path = request.path();
    let model = request.model().to_string();
    let usage = extract_usage(response);

    match parse_judge_output(&extract_text(response)) {
        Some(mut decision) => {
            decision.intervene = decision.intervene && decision.confidence >= threshold;
            JudgeVerdict {
                decision,
                status: JudgeStatus::Decided { path, model },
                usage,
            }
        }
        None => {
            tracing::info!(path = path.as_str(), model = %model, "Judge output was not a decision");
            JudgeVerdict {
                decision: JudgeDecision::default(),
                status: JudgeStatus::Malformed { path, model },
                usage,
            }
        }
    }
}

/// Parse raw judge output into an (un-thresholded) decision.
///
/// Backtick fences and a `json` language tag are stripped; empty output reads
/// as `{}`. Returns `None` for anything that is not a JSON object with a
/// numeric (or numeric-string) confidence.
pub fn parse_judge_output(raw: &str) -> Option<JudgeDecision> {
    let mut body = raw.trim().trim_matches('`').trim();
    if let Some(rest) = body.strip_prefix("json") {
        body = rest.trim();
    }
    if body.is_empty() {
        body = "{}";
    }

    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let intervene = object.get("intervene").is_some_and(truthy);
    let intent = match object.get("intent") {
        None | Some(Value::Null) => Intent::default(),
        Some(Value::String(s)) => Intent::from(s.clone()),
        Some(other) => Intent::from(other.to_string()),
    };
    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };
    if !confidence.is_finite() {
        return None;
    }

    Some(JudgeDecision {
        intervene,
        intent,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use chatbot_observe::redact::Redactor;
    use chatbot_observe::trace::{LlmTracer, TraceSettings};
    use chatbot_types::llm::LlmError;
    use serde_json::json;

    fn client(provider: &ScriptedProvider) -> LlmClient<ScriptedProvider> {
        LlmClient::new(
            provider.clone(),
            LlmTracer::new(TraceSettings::default(), Redactor::empty()),
        )
    }

    fn context(n: usize) -> Vec<ChatMessage> {
        (0..n).map(|i| ChatMessage::user(format!("m{i}"))).collect()
    }

    fn answer(text: &str) -> Result<Value, LlmError> {
        Ok(json!({"output_text": text, "usage": {"input_tokens": 40, "output_tokens": 6}}))
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = parse_judge_output(r#"{"intervene": true, "intent": "joke", "confidence": 0.9}"#)
            .unwrap();
        assert!(plain.intervene);
        assert_eq!(plain.intent, Intent::Joke);
        assert_eq!(plain.confidence, 0.9);

        let fenced = parse_judge_output("```json\n{\"intervene\": true, \"confidence\": \"0.7\"}\n```")
            .unwrap();
        assert!(fenced.intervene);
        assert_eq!(fenced.intent, Intent::Help);
        assert_eq!(fenced.confidence, 0.7);
    }

    #[test]
    fn test_parse_edge_cases() {
        assert_eq!(parse_judge_output(""), Some(JudgeDecision::default()));
        assert_eq!(parse_judge_output("not json"), None);
        assert_eq!(parse_judge_output("[1, 2]"), None);
        assert_eq!(parse_judge_output(r#"{"confidence": "high"}"#), None);

        let clamped = parse_judge_output(r#"{"intervene": 1, "intent": "lore", "confidence": 3}"#)
            .unwrap();
        assert!(clamped.intervene);
        assert_eq!(clamped.intent, Intent::Other("lore".into()));
        assert_eq!(clamped.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_decided_on_first_attempt_with_threshold() {
        let provider = ScriptedProvider::new();
        provider.push_create(answer(r#"{"intervene": true, "intent": "snark", "confidence": 0.5}"#));

        let verdict = client(&provider).judge("gpt-5-mini", &context(8), 0.6).await;
        assert!(!verdict.decision.intervene, "0.5 is below the 0.6 threshold");
        assert_eq!(verdict.decision.intent, Intent::Snark);
        assert_eq!(verdict.decision.confidence, 0.5);
        assert_eq!(
            verdict.status,
            JudgeStatus::Decided {
                path: ApiPath::Responses,
                model: "gpt-5-mini".into()
            }
        );
        assert_eq!(verdict.usage, Usage::new(40, 6, 0));

        let body = provider.requests()[0].to_json();
        let input = body["input"].as_array().unwrap();
        // developer instruction plus the last five messages
        assert_eq!(input.len(), 1 + JUDGE_CONTEXT_MESSAGES);
        assert_eq!(input[0]["role"], "developer");
        assert_eq!(input[1]["content"][0]["text"], "m3");
        assert_eq!(body["reasoning"]["effort"], "minimal");
        assert_eq!(body["text"]["verbosity"], "low");
    }

    #[tokio::test]
    async fn test_malformed_output_is_safe_default() {
        let provider = ScriptedProvider::new();
        provider.push_create(answer("I think the bot should say hi"));

        let verdict = client(&provider).judge("gpt-5-mini", &context(2), 0.1).await;
        assert!(!verdict.decision.intervene);
        assert_eq!(verdict.decision.intent, Intent::Help);
        assert_eq!(verdict.decision.confidence, 0.0);
        assert!(matches!(verdict.status, JudgeStatus::Malformed { .. }));
        assert_eq!(verdict.billed_model(), Some("gpt-5-mini"));
        assert_eq!(provider.requests().len(), 1, "a parse failure ends the sequence");
    }

    #[tokio::test]
    async fn test_attempt_sequence_reaches_fallback_model() {
        let provider = ScriptedProvider::new();
        provider.push_create(Err(LlmError::Http {
            status: 404,
            body: "model not found".into(),
        }));
        provider.push_create(Err(LlmError::Http {
            status: 404,
            body: "model not found".into(),
        }));
        provider.push_create(answer(r#"{"intervene": true, "intent": "help", "confidence": 0.8}"#));

        let verdict = client(&provider).judge("tiny-model", &context(3), 0.6).await;
        assert!(verdict.decision.intervene);
        assert_eq!(
            verdict.status,
            JudgeStatus::Decided {
                path: ApiPath::Responses,
                model: JUDGE_FALLBACK_MODEL.into()
            }
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].path(), ApiPath::Responses);
        assert_eq!(requests[0].model(), "tiny-model");
        assert_eq!(requests[1].path(), ApiPath::ChatCompletions);
        assert_eq!(requests[1].to_json()["messages"][0]["role"], "system");
        assert_eq!(requests[2].model(), JUDGE_FALLBACK_MODEL);
    }

    #[tokio::test]
    async fn test_all_attempts_failing_is_unavailable() {
        let provider = ScriptedProvider::new();
        let verdict = client(&provider).judge("gpt-5-mini", &context(1), 0.6).await;
        assert_eq!(verdict, JudgeVerdict::unavailable());
        assert_eq!(verdict.decision, JudgeDecision::default());
        assert_eq!(verdict.billed_model(), None);
        assert_eq!(provider.requests().len(), 3);
    }
}
