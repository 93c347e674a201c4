//! Per-call tracing of outbound LLM requests.
//!
//! [`LlmTracer`] emits one `meta` record per call (path, phase, model, latency,
//! request id, usage; never message content) and, in `full` mode, a second
//! record carrying the request and response payloads. The mode is read from a
//! shared [`TraceSettings`] handle on every call, so it can be switched at
//! runtime without rebuilding the tracer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chatbot_types::config::TraceMode;
use chatbot_types::llm::{ApiPath, CallPhase, Usage};
use serde_json::Value;

use crate::redact::Redactor;

/// Target used for every trace record.
pub const TRACE_TARGET: &str = "chatbot::trace";

/// Shared, mutable trace mode. Clones observe the same setting.
#[derive(Debug, Clone)]
pub struct TraceSettings {
    mode: Arc<AtomicU8>,
}

impl TraceSettings {
    pub fn new(mode: TraceMode) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(encode(mode))),
        }
    }

    pub fn mode(&self) -> TraceMode {
        decode(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: TraceMode) {
        self.mode.store(encode(mode), Ordering::Relaxed);
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self::new(TraceMode::Meta)
    }
}

fn encode(mode: TraceMode) -> u8 {
    match mode {
        TraceMode::Off => 0,
        TraceMode::Meta => 1,
        TraceMode::Full => 2,
    }
}

fn decode(raw: u8) -> TraceMode {
    match raw {
        0 => TraceMode::Off,
        2 => TraceMode::Full,
        _ => TraceMode::Meta,
    }
}

/// Facts about one completed provider call.
#[derive(Debug, Clone)]
pub struct CallTrace<'a> {
    pub path: ApiPath,
    pub phase: CallPhase,
    pub model: &'a str,
    pub latency_ms: u64,
    pub request_id: Option<&'a str>,
    pub usage: Usage,
}

/// Redaction-aware tracer for provider calls.
#[derive(Debug, Clone)]
pub struct LlmTracer {
    settings: TraceSettings,
    redactor: Redactor,
}

impl LlmTracer {
    pub fn new(settings: TraceSettings, redactor: Redactor) -> Self {
        Self { settings, redactor }
    }

    /// Handle to the live trace mode.
    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Emit the metadata record. Suppressed only in `off` mode.
    pub fn meta(&self, call: &CallTrace<'_>) {
        if self.settings.mode() == TraceMode::Off {
            return;
        }

        let model = self.redactor.redact_text(call.model);
        let request_id = self.redactor.redact_text(call.request_id.unwrap_or_default());
        let message = format!(
            "trace-openai: path={} model={} latency_ms={} input={} output={} cached={} req_id={}",
            call.path,
            model,
            call.latency_ms,
            call.usage.input_tokens,
            call.usage.output_tokens,
            call.usage.cached_input_tokens,
            request_id,
        );

        tracing::info!(
            target: "chatbot::trace",
            trace_type = "openai",
            mode = "meta",
            path = call.path.as_str(),
            phase = call.phase.as_str(),
            model = %model,
            latency_ms = call.latency_ms,
            request_id = %request_id,
            usage.input = call.usage.input_tokens,
            usage.output = call.usage.output_tokens,
            usage.cached = call.usage.cached_input_tokens,
            "{message}"
        );
    }

    /// Emit the payload record. Only in `full` mode.
    ///
    /// Payloads pass the structured redactor first, then text redaction.
    pub fn full(&self, call: &CallTrace<'_>, request: &Value, response: &Value) {
        if self.settings.mode() != TraceMode::Full {
            return;
        }

        let inputs = self.render(request);
        let outputs = self.render(response);
        tracing::info!(
            target: "chatbot::trace",
            trace_type = "openai",
            mode = "full",
            path = call.path.as_str(),
            phase = call.phase.as_str(),
            model = %self.redactor.redact_text(call.model),
            inputs_len = inputs.len(),
            outputs_len = outputs.len(),
            "trace-openai-full: inputs={inputs} outputs={outputs}"
        );
    }

    fn render(&self, payload: &Value) -> String {
        if payload.is_null() {
            return String::new();
        }
        let redacted = self.redactor.redact_value(payload);
        self.redactor.redact_text(&redacted.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::{REDACTED, SECRET_ENV_NAMES, SECRET_ENV_PREFIXES};
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<serde_json::Value> {
            let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            raw.lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn run_captured(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let capture = Capture::default();
        let sink = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.lines()
    }

    fn tracer(mode: TraceMode) -> LlmTracer {
        let redactor = Redactor::from_vars(
            vec![(
                "OPENAI_API_KEY".to_string(),
                "sk-SECRETKEY-1234567890".to_string(),
            )],
            SECRET_ENV_NAMES,
            SECRET_ENV_PREFIXES,
        );
        LlmTracer::new(TraceSettings::new(mode), redactor)
    }

    fn call() -> CallTrace<'static> {
        CallTrace {
            path: ApiPath::Responses,
            phase: CallPhase::Chat,
            model: "gpt-5-mini",
            latency_ms: 42,
            request_id: Some("req_123"),
            usage: Usage::new(10, 5, 0),
        }
    }

    #[test]
    fn test_meta_record_shape() {
        let t = tracer(TraceMode::Meta);
        let lines = run_captured(|| t.meta(&call()));
        assert_eq!(lines.len(), 1);
        let record = &lines[0];
        assert_eq!(record["target"], TRACE_TARGET);
        let fields = &record["fields"];
        assert_eq!(fields["trace_type"], "openai");
        assert_eq!(fields["path"], "responses.create");
        assert_eq!(fields["phase"], "chat");
        assert_eq!(fields["model"], "gpt-5-mini");
        assert_eq!(fields["latency_ms"], 42);
        assert_eq!(fields["request_id"], "req_123");
        assert_eq!(fields["usage.input"], 10);
        assert_eq!(fields["usage.output"], 5);
        assert!(
            fields["message"]
                .as_str()
                .unwrap()
                .starts_with("trace-openai: path=responses.create model=gpt-5-mini")
        );
    }

    #[test]
    fn test_mode_is_read_at_call_time() {
        let t = tracer(TraceMode::Off);
        let handle = t.settings().clone();

        let lines = run_captured(|| t.meta(&call()));
        assert!(lines.is_empty());

        handle.set_mode(TraceMode::Meta);
        let lines = run_captured(|| {
            t.meta(&call());
            t.full(&call(), &serde_json::json!({"model": "gpt-5-mini"}), &Value::Null);
        });
        assert_eq!(lines.len(), 1, "full record must stay off in meta mode");
    }

    #[test]
    fn test_full_record_is_redacted() {
        let t = tracer(TraceMode::Full);
        let request = serde_json::json!({"api_key": "sk-SECRETKEY-1234567890", "model": "gpt-5-mini"});
        let response = serde_json::json!("echo sk-SECRETKEY-1234567890");
        let lines = run_captured(|| t.full(&call(), &request, &response));
        assert_eq!(lines.len(), 1);

        let rendered = lines[0].to_string();
        assert!(rendered.contains(REDACTED));
        assert!(!rendered.contains("sk-SECRETKEY-1234567890"));
        assert_eq!(lines[0]["fields"]["mode"], "full");
    }
}
