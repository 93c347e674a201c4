//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use chatbot_types::llm::LlmError;

use super::payload::{ModerationRequest, ProviderRequest};
use super::provider::LlmProvider;

#[derive(Default)]
struct Script {
    create: VecDeque<Result<Value, LlmError>>,
    moderate: VecDeque<Result<Value, LlmError>>,
    requests: Vec<ProviderRequest>,
    moderations: Vec<ModerationRequest>,
}

/// Replays queued results in order and records every request it receives.
///
/// An exhausted queue answers with a provider error. Clones share the script.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_create(&self, result: Result<Value, LlmError>) {
        self.script.lock().unwrap().create.push_back(result);
    }

    pub fn push_moderate(&self, result: Result<Value, LlmError>) {
        self.script.lock().unwrap().moderate.push_back(result);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn moderations(&self) -> Vec<ModerationRequest> {
        self.script.lock().unwrap().moderations.clone()
    }
}

fn unscripted() -> LlmError {
    LlmError::Provider {
        message: "no scripted response".to_string(),
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create(&self, request: &ProviderRequest) -> Result<Value, LlmError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        script.create.pop_front().unwrap_or_else(|| Err(unscripted()))
    }

    async fn moderate(&self, request: &ModerationRequest) -> Result<Value, LlmError> {
        let mut script = self.script.lock().unwrap();
        script.moderations.push(request.clone());
        script.moderate.pop_front().unwrap_or_else(|| Err(unscripted()))
    }
}
