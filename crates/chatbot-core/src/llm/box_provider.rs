//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. `LlmProviderDyn` is the object-safe twin with boxed futures
//! 2. Blanket impl of `LlmProviderDyn` for all `T: LlmProvider`
//! 3. `BoxLlmProvider` wraps `Box<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use chatbot_types::llm::LlmError;

use super::payload::{ModerationRequest, ProviderRequest};
use super::provider::LlmProvider;

type BoxedResult<'a> = Pin<Box<dyn Future<Output = Result<Value, LlmError>> + Send + 'a>>;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn create_boxed<'a>(&'a self, request: &'a ProviderRequest) -> BoxedResult<'a>;

    fn moderate_boxed<'a>(&'a self, request: &'a ModerationRequest) -> BoxedResult<'a>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn create_boxed<'a>(&'a self, request: &'a ProviderRequest) -> BoxedResult<'a> {
        Box::pin(self.create(request))
    }

    fn moderate_boxed<'a>(&'a self, request: &'a ModerationRequest) -> BoxedResult<'a> {
        Box::pin(self.moderate(request))
    }
}

/// Type-erased LLM provider, chosen at runtime.
///
/// `LlmProvider` uses RPITIT and cannot be a trait object directly, so this
/// wrapper delegates to a boxed `LlmProviderDyn`. It implements `LlmProvider`
/// itself, which lets `LlmClient<BoxLlmProvider>` be the application type.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }
}

impl LlmProvider for BoxLlmProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create(&self, request: &ProviderRequest) -> Result<Value, LlmError> {
        self.inner.create_boxed(request).await
    }

    async fn moderate(&self, request: &ModerationRequest) -> Result<Value, LlmError> {
        self.inner.moderate_boxed(request).await
    }
}
