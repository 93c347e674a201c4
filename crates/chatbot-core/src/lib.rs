//! Business logic and port definitions for the chatbot broker.
//!
//! This crate holds the policy pieces (rate limiting, billing, request
//! adaptation, judging, moderation) and the traits that the infrastructure
//! layer implements. It never depends on `chatbot-infra` or any HTTP or
//! filesystem crate.

pub mod billing;
pub mod broker;
pub mod llm;
pub mod rate;
pub mod store;
