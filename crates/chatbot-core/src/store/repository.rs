//! State repository trait definition.

use chatbot_types::error::StoreError;

use super::document::StateDocument;

/// Durable storage for the [`StateDocument`].
///
/// Implementations live in chatbot-infra (e.g., `JsonFileStateRepository`).
/// `save` must be atomic: a reader never observes a partially written document.
pub trait StateRepository: Send + Sync {
    /// Load the stored document. A missing store yields an empty document.
    fn load(&self) -> impl std::future::Future<Output = Result<StateDocument, StoreError>> + Send;

    /// Replace the stored document.
    fn save(
        &self,
        document: &StateDocument,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
