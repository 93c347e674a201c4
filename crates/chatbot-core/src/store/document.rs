//! Persisted state document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chatbot_types::chat::{ChannelContext, GuildSettings};

use crate::billing::BillingLedger;
use crate::rate::RateBuckets;

/// Everything the store persists. Every field defaults, so a partial or
/// older document still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// Channel id -> conversation state.
    #[serde(default)]
    pub chats: BTreeMap<String, ChannelContext>,
    /// Guild id -> listening settings.
    #[serde(default)]
    pub guild_settings: BTreeMap<String, GuildSettings>,
    /// Base ledger, also the template for per-bot ledgers.
    #[serde(default)]
    pub billing: BillingLedger,
    #[serde(default)]
    pub billing_by_bot: BTreeMap<String, BillingLedger>,
    /// Bot id -> dimension -> key -> timestamps.
    #[serde(default)]
    pub rate_windows_by_bot: BTreeMap<String, RateBuckets>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbot_types::chat::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_top_level_field_names() {
        let json = serde_json::to_value(StateDocument::default()).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["billing", "billing_by_bot", "chats", "guild_settings", "rate_windows_by_bot"]
        );
    }

    #[test]
    fn test_partial_document_loads() {
        let doc: StateDocument = serde_json::from_value(json!({
            "chats": {"42": {"turns": 1, "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ]}},
            "billing": {"daily_usd": 1.5, "budget_daily_usd": 10.0},
            "rate_windows_by_bot": {"bot-1": {"user": {"7": [1.0, 2.0]}}}
        }))
        .unwrap();

        assert_eq!(doc.chats["42"].messages[0], ChatMessage::user("hi"));
        assert_eq!(doc.billing.daily_usd, 1.5);
        assert_eq!(doc.billing.thresholds, vec![0.5, 0.8, 1.0]);
        assert!(doc.billing.hard_stop);
        assert_eq!(doc.rate_windows_by_bot["bot-1"].events("user", "7"), &[1.0, 2.0]);
        assert!(doc.guild_settings.is_empty());
    }
}
