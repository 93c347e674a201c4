//! LlmProvider trait definition.
//!
//! The narrow surface the broker needs from a model vendor: submit a request
//! body in either API shape, or moderate a piece of text. Responses come back
//! as raw JSON documents; normalization happens in [`super::extract`].

use serde_json::Value;

use chatbot_types::llm::LlmError;

use super::payload::{ModerationRequest, ProviderRequest};

/// Trait for LLM provider backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Implementations
/// live in chatbot-infra (e.g., `OpenAiProvider`); tests use a scripted one.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request in either shape and return the response document.
    fn create(
        &self,
        request: &ProviderRequest,
    ) -> impl std::future::Future<Output = Result<Value, LlmError>> + Send;

    /// Send a moderation request and return the response document.
    fn moderate(
        &self,
        request: &ModerationRequest,
    ) -> impl std::future::Future<Output = Result<Value, LlmError>> + Send;
}
