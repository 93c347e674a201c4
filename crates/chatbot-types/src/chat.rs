//! Chat history types: role-tagged messages and per-channel context.
//!
//! A `ChannelContext` owns the messages of one channel. Messages are
//! immutable once appended; the only mutation is trimming old entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role of a message in a chat history.
///
/// Deserialization is lenient: any unrecognized role string becomes
/// [`ChatRole::User`], which is also how unknown roles are sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChatRole {
    System,
    Developer,
    User,
    Assistant,
}

impl ChatRole {
    /// Whether this role carries instructions rather than conversation.
    pub fn is_instruction(self) -> bool {
        matches!(self, ChatRole::System | ChatRole::Developer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::Developer => "developer",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ChatRole {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "system" => ChatRole::System,
            "developer" => ChatRole::Developer,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}

impl From<String> for ChatRole {
    fn from(s: String) -> Self {
        ChatRole::from(s.as_str())
    }
}

/// A single message in a channel's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    /// Whether a user message was addressed to the bot (mention, trigger word).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressed: Option<bool>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            addressed: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn developer(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Developer, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Mark whether this message was addressed to the bot.
    pub fn with_addressed(mut self, addressed: bool) -> Self {
        self.addressed = Some(addressed);
        self
    }
}

/// Conversation state for a single channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelContext {
    #[serde(default)]
    pub turns: u32,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChannelContext {
    /// Append one completed exchange and count it as a turn.
    pub fn push_exchange(&mut self, user: ChatMessage, assistant: ChatMessage) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.turns += 1;
    }

    /// Drop the oldest messages so that at most `max_messages` remain.
    pub fn trim(&mut self, max_messages: usize) {
        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Select the history to send upstream.
    ///
    /// Returns the last `last_n` messages. When `include_non_addressed` is
    /// false, user messages not addressed to the bot are filtered out first;
    /// assistant messages are always kept.
    pub fn recent(&self, last_n: usize, include_non_addressed: bool) -> Vec<ChatMessage> {
        let selected: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| {
                include_non_addressed
                    || m.role != ChatRole::User
                    || m.addressed.unwrap_or(false)
            })
            .collect();
        let start = selected.len().saturating_sub(last_n);
        selected[start..].iter().map(|m| (*m).clone()).collect()
    }
}

/// Per-guild listening settings, persisted alongside chat state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    #[serde(default)]
    pub listen_enabled: bool,
    #[serde(default)]
    pub denied_channels: Vec<String>,
    #[serde(default)]
    pub allowed_channels: Vec<String>,
    /// Last proactive intervention per channel (unix seconds).
    #[serde(default)]
    pub last_channel_ts: BTreeMap<String, f64>,
    /// Last proactive intervention per user (unix seconds).
    #[serde(default)]
    pub last_user_ts: BTreeMap<String, f64>,
}
