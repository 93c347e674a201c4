//! In-process owner of chat, guild, billing and rate-limit state.
//!
//! `MemoryStore` is a plain value with no locking. The broker keeps it
//! behind a single async mutex, so every mutation and every snapshot sees a
//! consistent state.

use chatbot_types::chat::{ChannelContext, GuildSettings};
use chatbot_types::config::BudgetConfig;

use crate::billing::BillingLedger;
use crate::rate::RateBuckets;

use super::document::StateDocument;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: StateDocument,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: StateDocument) -> Self {
        Self { state: document }
    }

    /// Point-in-time copy for persistence.
    pub fn snapshot(&self) -> StateDocument {
        self.state.clone()
    }

    /// Context for a channel, created empty on first access.
    pub fn channel(&mut self, channel_id: &str) -> &mut ChannelContext {
        self.state.chats.entry(channel_id.to_string()).or_default()
    }

    /// Context for a channel without creating it.
    pub fn peek_channel(&self, channel_id: &str) -> Option<&ChannelContext> {
        self.state.chats.get(channel_id)
    }

    /// Forget one channel. Returns whether it existed.
    pub fn reset_channel(&mut self, channel_id: &str) -> bool {
        self.state.chats.remove(channel_id).is_some()
    }

    /// Forget every channel. Returns how many were cleared.
    pub fn reset_all(&mut self) -> usize {
        let cleared = self.state.chats.len();
        self.state.chats.clear();
        cleared
    }

    /// Settings for a guild, created with defaults on first access.
    pub fn guild_settings(&mut self, guild_id: &str) -> &mut GuildSettings {
        self.state
            .guild_settings
            .entry(guild_id.to_string())
            .or_default()
    }

    /// The base ledger.
    pub fn billing(&self) -> &BillingLedger {
        &self.state.billing
    }

    pub fn billing_mut(&mut self) -> &mut BillingLedger {
        &mut self.state.billing
    }

    /// Ledger for one bot.
    ///
    /// Created on first access as a copy of the base ledger's budget policy
    /// with zeroed totals; later changes to the base do not propagate.
    pub fn billing_for(&mut self, bot_id: &str) -> &mut BillingLedger {
        let base = &self.state.billing;
        self.state
            .billing_by_bot
            .entry(bot_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(bot_id, "Created ledger from base budget policy");
                base.template()
            })
    }

    /// Per-bot ledgers that exist so far.
    pub fn bot_ledgers(&self) -> impl Iterator<Item = (&str, &BillingLedger)> {
        self.state
            .billing_by_bot
            .iter()
            .map(|(id, ledger)| (id.as_str(), ledger))
    }

    /// Update budgets on one bot's ledger, or on the base ledger when
    /// `bot_id` is `None`. `None` amounts leave the current value untouched.
    pub fn set_budgets(&mut self, bot_id: Option<&str>, daily_usd: Option<f64>, monthly_usd: Option<f64>) {
        let ledger = match bot_id {
            Some(id) => self.billing_for(id),
            None => self.billing_mut(),
        };
        ledger.set_budgets(daily_usd, monthly_usd);
    }

    /// Apply configured budget policy to the base ledger and to every
    /// existing bot ledger. Ledgers created later copy it from the base.
    pub fn apply_budget_policy(&mut self, config: &BudgetConfig) {
        self.state.billing.apply_policy(config);
        for (bot_id, ledger) in self.state.billing_by_bot.iter_mut() {
            tracing::debug!(bot_id = %bot_id, "Applied configured budget policy");
            ledger.apply_policy(config);
        }
    }

    /// Rate-limit buckets for one bot, created empty on first access.
    pub fn rate_windows_for(&mut self, bot_id: &str) -> &mut RateBuckets {
        self.state
            .rate_windows_by_bot
            .entry(bot_id.to_string())
            .or_default()
    }
}
