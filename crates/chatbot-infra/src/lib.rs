//! Infrastructure layer for the chatbot.
//!
//! Contains implementations of the ports defined in `chatbot-core`: the
//! OpenAI HTTP provider and the JSON state file, plus configuration and
//! data directory resolution.

pub mod config;
pub mod llm;
pub mod state;
