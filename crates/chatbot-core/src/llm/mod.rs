//! Provider abstraction, request adaptation and the calls layered on it.

pub mod box_provider;
pub mod client;
pub mod extract;
pub mod judge;
pub mod moderation;
pub mod payload;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use box_provider::BoxLlmProvider;
pub use client::LlmClient;
pub use judge::{JudgeStatus, JudgeVerdict};
pub use moderation::ModerationOutcome;
pub use provider::LlmProvider;
