//! Traced provider client with the chat-completion fallback chain.

use std::time::Instant;

use serde_json::Value;
use tracing::{Instrument, Span, info_span};

use chatbot_observe::genai_attrs::{
    ERROR_TYPE, GEN_AI_RESPONSE_ID, GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS,
};
use chatbot_observe::trace::{CallTrace, LlmTracer};
use chatbot_types::chat::ChatMessage;
use chatbot_types::config::TraceMode;
use chatbot_types::llm::{ApiPath, CallPhase, Completion, CompletionOptions, LlmError};

use super::extract::{extract_request_id, extract_text, extract_usage};
use super::payload::{ChatCompletionsRequest, ModerationRequest, ProviderRequest, ResponsesRequest};
use super::provider::LlmProvider;

/// A provider plus the tracer that observes every call made through it.
pub struct LlmClient<P> {
    provider: P,
    tracer: LlmTracer,
}

impl<P: LlmProvider> LlmClient<P> {
    pub fn new(provider: P, tracer: LlmTracer) -> Self {
        Self { provider, tracer }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn tracer(&self) -> &LlmTracer {
        &self.tracer
    }

    /// Complete a chat history.
    ///
    /// Tries the Responses API first and the Chat Completions API second, with
    /// the same messages. Returns [`LlmError::Exhausted`] carrying both failures
    /// when neither succeeds.
    pub async fn complete_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let primary = ProviderRequest::Responses(ResponsesRequest::new(model, messages, options));
        let primary_err = match self.send(&primary, CallPhase::Chat).await {
            Ok(response) => return Ok(completion(&primary, &response)),
            Err(e) => e,
        };
        tracing::info!(
            model,
            error = %primary_err,
            "responses.create failed, retrying with chat.completions.create"
        );

        let secondary = ProviderRequest::ChatCompletions(ChatCompletionsRequest::new(model, messages));
        match self.send(&secondary, CallPhase::Chat).await {
            Ok(response) => Ok(completion(&secondary, &response)),
            Err(secondary_err) => Err(LlmError::Exhausted {
                primary: Box::new(primary_err),
                secondary: Box::new(secondary_err),
            }),
        }
    }

    /// Send one completion request inside a GenAI span and trace it on success.
    pub(crate) async fn send(
        &self,
        request: &ProviderRequest,
        phase: CallPhase,
    ) -> Result<Value, LlmError> {
        let span = info_span!(
            "gen_ai.request",
            gen_ai.operation.name = phase.as_str(),
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = request.model(),
            api.path = request.path().as_str(),
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.id = tracing::field::Empty,
            "error.type" = tracing::field::Empty,
        );
        let started = Instant::now();
        let result = self.provider.create(request).instrument(span.clone()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        record_outcome(&span, &result);
        let _entered = span.enter();
        match &result {
            Ok(response) => self.trace(
                request.path(),
                phase,
                request.model(),
                latency_ms,
                || request.to_json(),
                response,
            ),
            Err(e) => tracing::debug!(
                path = request.path().as_str(),
                phase = phase.as_str(),
                model = request.model(),
                latency_ms,
                error = %e,
                "Provider call failed"
            ),
        }
        result
    }

    /// Send one moderation request inside a GenAI span and trace it on success.
    pub(crate) async fn send_moderation(&self, request: &ModerationRequest) -> Result<Value, LlmError> {
        let span = info_span!(
            "gen_ai.moderation",
            gen_ai.operation.name = CallPhase::Moderate.as_str(),
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = request.model.as_str(),
            api.path = ApiPath::Moderations.as_str(),
            gen_ai.response.id = tracing::field::Empty,
            "error.type" = tracing::field::Empty,
        );
        let started = Instant::now();
        let result = self.provider.moderate(request).instrument(span.clone()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        record_outcome(&span, &result);
        let _entered = span.enter();
        match &result {
            Ok(response) => self.trace(
                ApiPath::Moderations,
                CallPhase::Moderate,
                &request.model,
                latency_ms,
                || serde_json::to_value(request).unwrap_or(Value::Null),
                response,
            ),
            Err(e) => tracing::debug!(
                path = ApiPath::Moderations.as_str(),
                model = %request.model,
                latency_ms,
                error = %e,
                "Moderation call failed"
            ),
        }
        result
    }

    fn trace(
        &self,
        path: ApiPath,
        phase: CallPhase,
        model: &str,
        latency_ms: u64,
        request_body: impl FnOnce() -> Value,
        response: &Value,
    ) {
        let request_id = extract_request_id(response);
        let call = CallTrace {
            path,
            phase,
            model,
            latency_ms,
            request_id: request_id.as_deref(),
            usage: extract_usage(response),
        };
        self.tracer.meta(&call);
        if self.tracer.settings().mode() == TraceMode::Full {
            self.tracer.full(&call, &request_body(), response);
        }
    }
}

/// Record usage and response id, or the error class, on a call span.
///
/// Fields the span did not declare are ignored.
fn record_outcome(span: &Span, result: &Result<Value, LlmError>) {
    match result {
        Ok(response) => {
            let usage = extract_usage(response);
            span.record(GEN_AI_USAGE_INPUT_TOKENS, usage.input_tokens);
            span.record(GEN_AI_USAGE_OUTPUT_TOKENS, usage.output_tokens);
            if let Some(id) = extract_request_id(response) {
                span.record(GEN_AI_RESPONSE_ID, id.as_str());
            }
        }
        Err(e) => {
            span.record(ERROR_TYPE, e.kind());
        }
    }
}

fn completion(request: &ProviderRequest, response: &Value) -> Completion {
    Completion {
        text: extract_text(response),
        usage: extract_usage(response),
        model: request.model().to_string(),
        path: request.path(),
        request_id: extract_request_id(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use chatbot_observe::redact::Redactor;
    use chatbot_observe::trace::TraceSettings;
    use chatbot_types::llm::{ReasoningEffort, Usage};
    use serde_json::json;

    fn client(provider: &ScriptedProvider) -> LlmClient<ScriptedProvider> {
        LlmClient::new(
            provider.clone(),
            LlmTracer::new(TraceSettings::default(), Redactor::empty()),
        )
    }

    #[tokio::test]
    async fn test_primary_path_success() {
        let provider = ScriptedProvider::new();
        provider.push_create(Ok(json!({
            "id": "resp_1",
            "output_text": "hello",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        })));

        let options = CompletionOptions {
            reasoning: Some(ReasoningEffort::Low),
            ..Default::default()
        };
        let done = client(&provider)
            .complete_chat("gpt-5-mini", &[ChatMessage::user("hi")], &options)
            .await
            .unwrap();

        assert_eq!(done.text, "hello");
        assert_eq!(done.usage, Usage::new(12, 3, 0));
        assert_eq!(done.path, ApiPath::Responses);
        assert_eq!(done.request_id.as_deref(), Some("resp_1"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].to_json()["reasoning"]["effort"], "low");
    }

    #[tokio::test]
    async fn test_falls_back_to_chat_completions() {
        let provider = ScriptedProvider::new();
        provider.push_create(Err(LlmError::Http {
            status: 400,
            body: "unsupported".into(),
        }));
        provider.push_create(Ok(json!({
            "choices": [{"message": {"role": "assistant", "content": "fallback"}}],
            "usage": {"prompt_tokens": 8, "completion_tokens": 2}
        })));

        let messages = [ChatMessage::system("be nice"), ChatMessage::user("hi")];
        let done = client(&provider)
            .complete_chat("gpt-4o", &messages, &CompletionOptions::default())
            .await
            .unwrap();

        assert_eq!(done.text, "fallback");
        assert_eq!(done.path, ApiPath::ChatCompletions);
        assert_eq!(done.usage, Usage::new(8, 2, 0));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].to_json()["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_one_combined_error() {
        let provider = ScriptedProvider::new();
        provider.push_create(Err(LlmError::Transport("reset".into())));
        provider.push_create(Err(LlmError::AuthenticationFailed));

        let err = client(&provider)
            .complete_chat("gpt-5-mini", &[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();

        match &err {
            LlmError::Exhausted { primary, secondary } => {
                assert!(matches!(**primary, LlmError::Transport(_)));
                assert!(matches!(**secondary, LlmError::AuthenticationFailed));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("reset"));
        assert!(message.contains("authentication failed"));
    }

    #[tokio::test]
    async fn test_empty_response_is_empty_text() {
        let provider = ScriptedProvider::new();
        provider.push_create(Ok(json!({})));
        let done = client(&provider)
            .complete_chat("gpt-5", &[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(done.text, "");
        assert_eq!(done.usage, Usage::default());
    }

    mod spans {
        use std::fmt;
        use std::sync::{Arc, Mutex};

        use tracing::field::{Field, Visit};
        use tracing::span::{Attributes, Id, Record};
        use tracing::Subscriber;
        use tracing_subscriber::layer::{Context, Layer};

        type Entry = (u64, &'static str, Vec<String>);

        /// Collects span names and `field=value` pairs, in creation order.
        /// Span ids are reused after close, so records go to the newest match.
        #[derive(Clone, Default)]
        pub struct SpanLog(Arc<Mutex<Vec<Entry>>>);

        impl SpanLog {
            pub fn spans(&self) -> Vec<(&'static str, Vec<String>)> {
                self.0
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(_, name, fields)| (*name, fields.clone()))
                    .collect()
            }
        }

        struct Fields<'a>(&'a mut Vec<String>);

        impl Visit for Fields<'_> {
            fn record_str(&mut self, field: &Field, value: &str) {
                self.0.push(format!("{}={value}", field.name()));
            }

            fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                self.0.push(format!("{}={value:?}", field.name()));
            }
        }

        impl<S: Subscriber> Layer<S> for SpanLog {
            fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
                let mut fields = Vec::new();
                attrs.record(&mut Fields(&mut fields));
                self.0
                    .lock()
                    .unwrap()
                    .push((id.into_u64(), attrs.metadata().name(), fields));
            }

            fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
                let mut spans = self.0.lock().unwrap();
                if let Some((_, _, fields)) = spans.iter_mut().rev().find(|(i, _, _)| *i == id.into_u64()) {
                    values.record(&mut Fields(fields));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_every_call_opens_a_genai_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let log = spans::SpanLog::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

        let provider = ScriptedProvider::new();
        provider.push_create(Err(LlmError::Transport("reset".into())));
        provider.push_create(Ok(json!({
            "id": "chatcmpl_9",
            "choices": [{"message": {"content": "fine"}}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 2}
        })));
        provider.push_moderate(Ok(json!({"id": "modr_1", "results": [{"flagged": false}]})));

        let client = client(&provider);
        client
            .complete_chat("gpt-4o", &[ChatMessage::user("private question")], &CompletionOptions::default())
            .await
            .unwrap();
        client
            .send_moderation(&ModerationRequest {
                model: "omni-moderation-latest".into(),
                input: "private question".into(),
            })
            .await
            .unwrap();

        let spans = log.spans();
        assert_eq!(spans.len(), 3);

        let (name, failed) = &spans[0];
        assert_eq!(*name, "gen_ai.request");
        for expected in [
            "gen_ai.operation.name=chat",
            "gen_ai.provider.name=scripted",
            "gen_ai.request.model=gpt-4o",
            "api.path=responses.create",
            "error.type=transport",
        ] {
            assert!(failed.contains(&expected.to_string()), "{expected} in {failed:?}");
        }

        let (_, succeeded) = &spans[1];
        for expected in [
            "api.path=chat.completions.create",
            "gen_ai.usage.input_tokens=7",
            "gen_ai.usage.output_tokens=2",
            "gen_ai.response.id=chatcmpl_9",
        ] {
            assert!(succeeded.contains(&expected.to_string()), "{expected} in {succeeded:?}");
        }

        let (name, moderation) = &spans[2];
        assert_eq!(*name, "gen_ai.moderation");
        assert!(moderation.contains(&"gen_ai.response.id=modr_1".to_string()));

        let all: Vec<&String> = spans.iter().flat_map(|(_, f)| f).collect();
        assert!(all.iter().all(|f| !f.contains("private question")), "content stays out of spans");
    }
}
