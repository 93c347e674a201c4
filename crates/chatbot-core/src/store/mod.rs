//! Chat, guild, billing and rate-limit state.
//!
//! - [`document`]: the persisted document shape
//! - [`memory`]: [`MemoryStore`], the in-process owner of that state
//! - [`repository`]: the persistence port implemented by chatbot-infra

pub mod document;
pub mod memory;
pub mod repository;

pub use document::StateDocument;
pub use memory::MemoryStore;
pub use repository::StateRepository;
