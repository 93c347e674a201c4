//! Shared domain types for the chatbot broker.
//!
//! Chat messages, LLM call options and results, billing alert values, rate
//! windows, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod billing;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod rate;
