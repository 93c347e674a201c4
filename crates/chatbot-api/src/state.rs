//! Application state: the wired broker and where it lives on disk.
//!
//! Built once at startup and handed to every command handler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::SecretString;

use chatbot_core::broker::ChatBroker;
use chatbot_core::llm::{BoxLlmProvider, LlmClient};
use chatbot_core::rate::SystemClock;
use chatbot_infra::config::{API_KEY_ENV, api_key_from_env};
use chatbot_infra::llm::OpenAiProvider;
use chatbot_infra::state::JsonFileStateRepository;
use chatbot_observe::redact::Redactor;
use chatbot_observe::trace::{LlmTracer, TraceSettings};
use chatbot_types::config::{AppConfig, TraceMode};

/// The broker over the boxed OpenAI provider and the JSON state file.
pub type ConcreteBroker = ChatBroker<BoxLlmProvider, JsonFileStateRepository>;

pub struct AppState {
    pub broker: ConcreteBroker,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Wire the provider, tracer, clock and state file into a broker.
    ///
    /// `needs_provider` is false for commands that never call the model, so
    /// budgets and history can be managed without an API key.
    pub async fn init(
        data_dir: PathBuf,
        config: AppConfig,
        trace_mode: TraceMode,
        redactor: Redactor,
        needs_provider: bool,
    ) -> Result<Self> {
        let api_key = match api_key_from_env() {
            Some(key) => key,
            None if needs_provider => anyhow::bail!("{API_KEY_ENV} is not set"),
            None => SecretString::from(String::new()),
        };

        let provider = OpenAiProvider::new(api_key, &config.provider)
            .context("Failed to build the OpenAI client")?;

        let client = LlmClient::new(
            BoxLlmProvider::new(provider),
            LlmTracer::new(TraceSettings::new(trace_mode), redactor),
        );

        let repository = JsonFileStateRepository::in_data_dir(&data_dir);
        let broker = ChatBroker::load(client, repository, config, Arc::new(SystemClock))
            .await
            .with_context(|| format!("Failed to load state from {}", data_dir.display()))?;

        tracing::debug!(
            data_dir = %data_dir.display(),
            trace_openai = trace_mode.as_str(),
            "Application state initialized"
        );

        Ok(Self { broker, data_dir })
    }
}
