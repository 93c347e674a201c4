//! Text moderation with a fail-open policy.
//!
//! When the moderation backend cannot be reached, or answers with something
//! unreadable, the text is allowed: keeping the bot available takes priority
//! over moderation strictness. The outcome still records which case occurred.

use serde_json::Value;

use super::client::LlmClient;
use super::payload::ModerationRequest;
use super::provider::LlmProvider;

/// Result of a moderation check.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    Allowed,
    /// The provider flagged the text; `categories` lists the flagged ones.
    Flagged { categories: Vec<String> },
    /// The check could not be completed; the text is allowed.
    Unavailable { reason: String },
}

impl ModerationOutcome {
    /// Whether the text may proceed. Only an explicit flag blocks it.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, ModerationOutcome::Flagged { .. })
    }
}

impl<P: LlmProvider> LlmClient<P> {
    /// Moderate `text` with `model`. Never fails.
    pub async fn moderate(&self, model: &str, text: &str) -> ModerationOutcome {
        let request = ModerationRequest {
            model: model.to_string(),
            input: text.to_string(),
        };
        match self.send_moderation(&request).await {
            Ok(response) => read_moderation(&response),
            Err(e) => {
                tracing::warn!(model, error = %e, "Moderation unavailable, allowing text");
                ModerationOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Interpret `results[0]` of a moderation response.
fn read_moderation(response: &Value) -> ModerationOutcome {
    let Some(result) = response.pointer("/results/0") else {
        tracing::warn!("Moderation response had no results, allowing text");
        return ModerationOutcome::Unavailable {
            reason: "response had no results".to_string(),
        };
    };

    if !result.get("flagged").and_then(Value::as_bool).unwrap_or(false) {
        return ModerationOutcome::Allowed;
    }

    let categories = result
        .get("categories")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, flagged)| flagged.as_bool().unwrap_or(false))
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();
    ModerationOutcome::Flagged { categories }
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

    #[tokio::test]
    async fn test_clean_text_is_allowed() {
        let provider = ScriptedProvider::new();
        provider.push_moderate(Ok(json!({"results": [{"flagged": false}]})));

        let outcome = client(&provider).moderate("omni-moderation-latest", "hello").await;
        assert_eq!(outcome, ModerationOutcome::Allowed);
        assert!(outcome.is_allowed());
        assert_eq!(provider.moderations()[0].input, "hello");
    }

    #[tokio::test]
    async fn test_flagged_text_is_blocked() {
        let provider = ScriptedProvider::new();
        provider.push_moderate(Ok(json!({"results": [{
            "flagged": true,
            "categories": {"harassment": true, "violence": false}
        }]})));

        let outcome = client(&provider).moderate("omni-moderation-latest", "...").await;
        assert_eq!(
            outcome,
            ModerationOutcome::Flagged {
                categories: vec!["harassment".into()]
            }
        );
        assert!(!outcome.is_allowed());
    }

    #[tokio::test]
    async fn test_backend_failure_fails_open() {
        let provider = ScriptedProvider::new();
        provider.push_moderate(Err(LlmError::Transport("connection refused".into())));

        let outcome = client(&provider).moderate("omni-moderation-latest", "anything").await;
        assert!(outcome.is_allowed());
        match outcome {
            ModerationOutcome::Unavailable { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreadable_response_fails_open() {
        let provider = ScriptedProvider::new();
        provider.push_moderate(Ok(json!({"results": []})));

        let outcome = client(&provider).moderate("omni-moderation-latest", "anything").await;
        assert!(matches!(outcome, ModerationOutcome::Unavailable { .. }));
        assert!(outcome.is_allowed());
    }
}
