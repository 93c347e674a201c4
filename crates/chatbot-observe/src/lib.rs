//! Observability for the chatbot broker.
//!
//! - [`genai_attrs`]: GenAI semantic convention names for provider call spans
//! - [`redact`]: secret redaction for formatted log lines and structured payloads
//! - [`trace`]: per-call tracing of outbound LLM requests (`off` / `meta` / `full`)
//! - [`tracing_setup`]: subscriber initialization with optional OpenTelemetry export

pub mod genai_attrs;
pub mod redact;
pub mod trace;
pub mod tracing_setup;
