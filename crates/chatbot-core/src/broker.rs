//! Budget-aware, rate-limited broker for chat turns.
//!
//! A chat turn runs: optional moderation, budget check, rate limits, the
//! provider call (outside the store lock), then pricing and spend recording,
//! then the channel history update and a save. Declines are returned as
//! [`TurnOutcome`] variants; only provider exhaustion and persistence
//! failures are errors.

use std::sync::Arc;

use tokio::sync::Mutex;

use chatbot_types::billing::{BudgetExhausted, SpendDecision, SpendOutcome};
use chatbot_types::chat::ChatMessage;
use chatbot_types::config::AppConfig;
use chatbot_types::error::StoreError;
use chatbot_types::llm::{ApiPath, LlmError, Usage};

use crate::billing::BillingLedger;
use crate::billing::pricing::estimate_cost;
use crate::llm::judge::JudgeVerdict;
use crate::llm::moderation::ModerationOutcome;
use crate::llm::{LlmClient, LlmProvider};
use crate::rate::{Clock, DIM_CHANNEL, DIM_GUILD, DIM_USER, SlidingWindowLimiter};
use crate::store::{MemoryStore, StateRepository};

/// Feature names used in `by_feature` accounting.
pub const FEATURE_CHAT: &str = "chat";
pub const FEATURE_JUDGE: &str = "judge";

/// Target for budget alert records.
pub const BILLING_TARGET: &str = "chatbot::billing";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One incoming user message to answer.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub bot_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub guild_id: Option<String>,
    pub text: String,
    /// Whether the message was addressed to the bot (mention, reply, DM).
    pub addressed: bool,
    /// Optional instructions placed ahead of the history.
    pub instructions: Option<String>,
}

/// A delivered reply and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub model: String,
    pub path: ApiPath,
    pub usage: Usage,
    pub cost_usd: f64,
    pub spend: SpendOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Replied(TurnReply),
    /// The hard stop blocked the turn, before or after the call.
    BudgetExceeded(BudgetExhausted),
    /// A limiter dimension had no capacity.
    RateLimited { dimension: String },
    /// Moderation flagged the user text.
    Blocked { categories: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JudgeOutcome {
    Judged(JudgeVerdict),
    BudgetExceeded(BudgetExhausted),
}

/// Owns the store and brokers every provider call made on its behalf.
///
/// Generic over the provider and the persistence port; chatbot-core never
/// depends on chatbot-infra.
pub struct ChatBroker<P: LlmProvider, R: StateRepository> {
    client: LlmClient<P>,
    repository: R,
    store: Mutex<MemoryStore>,
    limiter: SlidingWindowLimiter,
    clock: Arc<dyn Clock>,
    config: AppConfig,
}

impl<P: LlmProvider, R: StateRepository> ChatBroker<P, R> {
    /// Load persisted state and build a broker.
    ///
    /// Budget policy from `config` is applied to the base ledger and every
    /// persisted bot ledger: configured budgets replace persisted ones, and
    /// thresholds and hard stop always come from configuration.
    pub async fn load(
        client: LlmClient<P>,
        repository: R,
        config: AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let document = repository.load().await?;
        let mut store = MemoryStore::from_document(document);

        store.apply_budget_policy(&config.budget);

        let limiter = SlidingWindowLimiter::new(config.rate_limits.clone(), clock.clone());
        Ok(Self {
            client,
            repository,
            store: Mutex::new(store),
            limiter,
            clock,
            config,
        })
    }

    pub fn client(&self) -> &LlmClient<P> {
        &self.client
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Answer one user message.
    pub async fn chat_turn(&self, request: TurnRequest) -> Result<TurnOutcome, BrokerError> {
        if self.config.moderation.enabled {
            let outcome = self
                .client
                .moderate(&self.config.models.moderation, &request.text)
                .await;
            if let ModerationOutcome::Flagged { categories } = outcome {
                tracing::info!(
                    bot_id = %request.bot_id,
                    channel_id = %request.channel_id,
                    ?categories,
                    "User text flagged by moderation"
                );
                return Ok(TurnOutcome::Blocked { categories });
            }
        }

        let user_message = ChatMessage::user(request.text.clone()).with_addressed(request.addressed);
        let messages = {
            let mut store = self.store.lock().await;
            let now = self.clock.now();

            if let Err(exhausted) = store.billing_for(&request.bot_id).budget_check(now) {
                tracing::info!(
                    bot_id = %request.bot_id,
                    period = %exhausted.period,
                    spent = exhausted.spent,
                    budget = exhausted.budget,
                    "Budget exhausted, turn declined"
                );
                return Ok(TurnOutcome::BudgetExceeded(exhausted));
            }

            let mut keys = vec![
                (DIM_USER, request.user_id.as_str()),
                (DIM_CHANNEL, request.channel_id.as_str()),
            ];
            if let Some(guild_id) = &request.guild_id {
                keys.push((DIM_GUILD, guild_id.as_str()));
            }
            // All dimensions are checked before any is recorded
            let buckets = store.rate_windows_for(&request.bot_id);
            if let Err(dimension) = self.limiter.allow_all(buckets, &keys) {
                // Pruning may have dropped expired timestamps
                self.persist(&store).await?;
                return Ok(TurnOutcome::RateLimited {
                    dimension: dimension.to_string(),
                });
            }

            let history = store.channel(&request.channel_id).recent(
                self.config.context.include_last_n,
                self.config.context.include_non_addressed,
            );
            let mut messages = Vec::with_capacity(history.len() + 2);
            if let Some(instructions) = &request.instructions {
                messages.push(ChatMessage::system(instructions.clone()));
            }
            messages.extend(history);
            messages.push(user_message.clone());
            messages
        };

        let result = self
            .client
            .complete_chat(&self.config.models.chat, &messages, &self.config.completion)
            .await;

        let mut store = self.store.lock().await;
        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                // Limiter timestamps were recorded before the call
                self.persist(&store).await?;
                return Err(e.into());
            }
        };

        let cost_usd = estimate_cost(&completion.usage, &completion.model, &self.config.pricing);
        let spend = self.record_spend(
            store.billing_for(&request.bot_id),
            &request.bot_id,
            cost_usd,
            &completion.model,
            FEATURE_CHAT,
        );

        if let SpendDecision::Declined {
            period,
            would_total,
            budget,
        } = spend.decision
        {
            tracing::warn!(
                bot_id = %request.bot_id,
                %period,
                would_total,
                budget,
                cost_usd,
                "Spend declined by hard stop, reply withheld"
            );
            self.persist(&store).await?;
            return Ok(TurnOutcome::BudgetExceeded(BudgetExhausted {
                period,
                spent: would_total - cost_usd,
                budget,
            }));
        }

        let channel = store.channel(&request.channel_id);
        channel.push_exchange(user_message, ChatMessage::assistant(completion.text.clone()));
        channel.trim(self.config.context.max_messages);
        self.persist(&store).await?;

        tracing::info!(
            bot_id = %request.bot_id,
            channel_id = %request.channel_id,
            model = %completion.model,
            path = completion.path.as_str(),
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            cost_usd,
            "Chat turn completed"
        );

        Ok(TurnOutcome::Replied(TurnReply {
            text: completion.text,
            model: completion.model,
            path: completion.path,
            usage: completion.usage,
            cost_usd,
            spend,
        }))
    }

    /// Ask the judge whether the bot should join a channel's conversation.
    ///
    /// `pending` is an incoming message not yet in the channel history. The
    /// judge's own spend is recorded under the `judge` feature.
    pub async fn judge(
        &self,
        bot_id: &str,
        channel_id: &str,
        pending: Option<ChatMessage>,
    ) -> Result<JudgeOutcome, BrokerError> {
        let context = {
            let mut store = self.store.lock().await;
            if let Err(exhausted) = store.billing_for(bot_id).budget_check(self.clock.now()) {
                return Ok(JudgeOutcome::BudgetExceeded(exhausted));
            }
            let mut context = store
                .peek_channel(channel_id)
                .map(|c| c.messages.clone())
                .unwrap_or_default();
            context.extend(pending);
            context
        };

        let verdict = self
            .client
            .judge(&self.config.models.judge, &context, self.config.judge.threshold)
            .await;

        let Some(model) = verdict.billed_model() else {
            return Ok(JudgeOutcome::Judged(verdict));
        };

        let mut store = self.store.lock().await;
        let cost_usd = estimate_cost(&verdict.usage, model, &self.config.pricing);
        let spend = self.record_spend(store.billing_for(bot_id), bot_id, cost_usd, model, FEATURE_JUDGE);
        self.persist(&store).await?;

        match spend.decision {
            SpendDecision::Declined {
                period,
                would_total,
                budget,
            } => Ok(JudgeOutcome::BudgetExceeded(BudgetExhausted {
                period,
                spent: would_total - cost_usd,
                budget,
            })),
            _ => Ok(JudgeOutcome::Judged(verdict)),
        }
    }

    /// Moderate text with the configured model (fails open).
    pub async fn moderate(&self, text: &str) -> ModerationOutcome {
        self.client.moderate(&self.config.models.moderation, text).await
    }

    /// Current ledger for a bot, or the base ledger, rolled to now.
    ///
    /// Reading does not create a per-bot ledger.
    pub async fn ledger(&self, bot_id: Option<&str>) -> BillingLedger {
        let store = self.store.lock().await;
        let mut ledger = match bot_id {
            Some(id) => store
                .bot_ledgers()
                .find(|(bot, _)| *bot == id)
                .map(|(_, ledger)| ledger.clone())
                .unwrap_or_else(|| store.billing().template()),
            None => store.billing().clone(),
        };
        ledger.roll_periods(self.clock.now());
        ledger
    }

    /// Ids of bots that have their own ledger.
    pub async fn bot_ids(&self) -> Vec<String> {
        let store = self.store.lock().await;
        store.bot_ledgers().map(|(id, _)| id.to_string()).collect()
    }

    pub async fn set_budgets(
        &self,
        bot_id: Option<&str>,
        daily_usd: Option<f64>,
        monthly_usd: Option<f64>,
    ) -> Result<(), BrokerError> {
        let mut store = self.store.lock().await;
        store.set_budgets(bot_id, daily_usd, monthly_usd);
        self.persist(&store).await?;
        tracing::info!(bot_id = bot_id.unwrap_or("base"), ?daily_usd, ?monthly_usd, "Budgets updated");
        Ok(())
    }

    /// Clear one channel's history. Returns whether it existed.
    pub async fn reset_channel(&self, channel_id: &str) -> Result<bool, BrokerError> {
        let mut store = self.store.lock().await;
        let existed = store.reset_channel(channel_id);
        self.persist(&store).await?;
        Ok(existed)
    }

    /// Clear every channel's history. Returns how many were cleared.
    pub async fn reset_all(&self) -> Result<usize, BrokerError> {
        let mut store = self.store.lock().await;
        let cleared = store.reset_all();
        self.persist(&store).await?;
        Ok(cleared)
    }

    /// Record a spend and log its alerts. A declined spend marks its period
    /// exhausted.
    fn record_spend(
        &self,
        ledger: &mut BillingLedger,
        bot_id: &str,
        cost_usd: f64,
        model: &str,
        feature: &str,
    ) -> SpendOutcome {
        let outcome = ledger.record_spend(cost_usd, model, feature, self.clock.now());
        if let SpendDecision::Declined { period, .. } = outcome.decision {
            // The provider already billed this call; stop paying for more.
            ledger.mark_exhausted(period);
        }
        for alert in &outcome.alerts {
            tracing::warn!(
                target: "chatbot::billing",
                bot_id,
                period = %alert.period,
                threshold = alert.threshold,
                spent = alert.spent,
                budget = alert.budget,
                "Budget alert: {} spend at {:.0}% of ${:.2}",
                alert.period,
                alert.percent(),
                alert.budget
            );
        }
        outcome
    }

    /// Save a snapshot taken under the store lock.
    async fn persist(&self, store: &MemoryStore) -> Result<(), StoreError> {
        self.repository.save(&store.snapshot()).await
    }
}
