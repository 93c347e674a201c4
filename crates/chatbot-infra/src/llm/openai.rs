//! OpenAiProvider -- concrete [`LlmProvider`] for the OpenAI HTTP API.
//!
//! Posts request bodies to `/responses`, `/chat/completions` and
//! `/moderations` and returns the JSON documents untouched. The API key is
//! wrapped in [`secrecy::SecretString`] and only exposed when building the
//! `Authorization` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use chatbot_core::llm::payload::{ModerationRequest, ProviderRequest};
use chatbot_core::llm::provider::LlmProvider;
use chatbot_types::config::ProviderConfig;
use chatbot_types::llm::LlmError;

/// OpenAI provider over plain HTTPS.
///
/// Does NOT derive Debug so the key never reaches a log line.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a provider with the configured base URL and request timeout.
    pub fn new(api_key: SecretString, config: &ProviderConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(format!("HTTP request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                code => LlmError::Http {
                    status: code,
                    body: api_error_message(&error_body),
                },
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse {path} response: {e}")))
    }
}

/// `Retry-After` in whole seconds, converted to milliseconds.
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}

/// The `error.message` of an OpenAI error body, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn create(&self, request: &ProviderRequest) -> Result<Value, LlmError> {
        match request {
            ProviderRequest::Responses(body) => self.post("/responses", body).await,
            ProviderRequest::ChatCompletions(body) => self.post("/chat/completions", body).await,
        }
    }

    async fn moderate(&self, request: &ModerationRequest) -> Result<Value, LlmError> {
        self.post("/moderations", request).await
    }
}
