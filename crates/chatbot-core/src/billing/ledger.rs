//! Spend ledger with per-period budgets, threshold alerts and hard stop.
//!
//! One ledger per bot identity. Period totals roll over when the UTC day or
//! month changes; rollover also resets that period's alert watermark.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatbot_types::billing::{BudgetAlert, BudgetExhausted, BudgetPeriod, SpendOutcome};
use chatbot_types::config::{BudgetConfig, default_hard_stop, default_thresholds};

/// `YYYY-MM-DD` key for the UTC day of `now`.
pub fn daily_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM` key for the UTC month of `now`.
pub fn monthly_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Cumulative spend and budget policy. Field names are the persisted names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingLedger {
    #[serde(default)]
    pub daily_usd: f64,
    #[serde(default)]
    pub daily_key: String,
    #[serde(default)]
    pub monthly_usd: f64,
    #[serde(default)]
    pub monthly_key: String,
    #[serde(default)]
    pub by_model: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_feature: BTreeMap<String, f64>,
    #[serde(default)]
    pub budget_daily_usd: Option<f64>,
    #[serde(default)]
    pub budget_monthly_usd: Option<f64>,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,
    #[serde(default = "default_hard_stop")]
    pub hard_stop: bool,
    /// Highest threshold already alerted for the current day.
    #[serde(default)]
    pub last_daily_alert: f64,
    /// Highest threshold already alerted for the current month.
    #[serde(default)]
    pub last_monthly_alert: f64,
    /// A spend was declined today; no further calls until the day rolls over.
    #[serde(default)]
    pub daily_exhausted: bool,
    /// A spend was declined this month; no further calls until the month rolls over.
    #[serde(default)]
    pub monthly_exhausted: bool,
}

impl Default for BillingLedger {
    fn default() -> Self {
        Self {
            daily_usd: 0.0,
            daily_key: String::new(),
            monthly_usd: 0.0,
            monthly_key: String::new(),
            by_model: BTreeMap::new(),
            by_feature: BTreeMap::new(),
            budget_daily_usd: None,
            budget_monthly_usd: None,
            thresholds: default_thresholds(),
            hard_stop: default_hard_stop(),
            last_daily_alert: 0.0,
            last_monthly_alert: 0.0,
            daily_exhausted: false,
            monthly_exhausted: false,
        }
    }
}

impl BillingLedger {
    /// Empty ledger carrying the configured budget policy.
    pub fn from_config(config: &BudgetConfig) -> Self {
        Self {
            budget_daily_usd: config.daily_usd,
            budget_monthly_usd: config.monthly_usd,
            thresholds: config.thresholds.clone(),
            hard_stop: config.hard_stop,
            ..Self::default()
        }
    }

    /// New ledger with this ledger's budget policy and zeroed totals.
    ///
    /// Used to create per-bot ledgers from the base ledger.
    pub fn template(&self) -> Self {
        Self {
            budget_daily_usd: self.budget_daily_usd,
            budget_monthly_usd: self.budget_monthly_usd,
            thresholds: self.thresholds.clone(),
            hard_stop: self.hard_stop,
            ..Self::default()
        }
    }

    /// Update budgets. `None` leaves the current value untouched.
    ///
    /// Changing a period's budget lifts its exhausted mark.
    pub fn set_budgets(&mut self, daily_usd: Option<f64>, monthly_usd: Option<f64>) {
        if let Some(daily) = daily_usd {
            if self.budget_daily_usd != Some(daily) {
                self.daily_exhausted = false;
            }
            self.budget_daily_usd = Some(daily);
        }
        if let Some(monthly) = monthly_usd {
            if self.budget_monthly_usd != Some(monthly) {
                self.monthly_exhausted = false;
            }
            self.budget_monthly_usd = Some(monthly);
        }
    }

    /// Apply configured policy: budgets the config sets, plus thresholds and
    /// hard stop. Totals are kept.
    pub fn apply_policy(&mut self, config: &BudgetConfig) {
        self.set_budgets(config.daily_usd, config.monthly_usd);
        self.thresholds = config.thresholds.clone();
        self.hard_stop = config.hard_stop;
    }

    /// Block further calls in `period` until it rolls over.
    ///
    /// Used when a call was already paid for but its spend was declined, so
    /// the recorded total alone would keep admitting calls.
    pub fn mark_exhausted(&mut self, period: BudgetPeriod) {
        match period {
            BudgetPeriod::Daily => self.daily_exhausted = true,
            BudgetPeriod::Monthly => self.monthly_exhausted = true,
        }
    }

    pub fn is_exhausted(&self, period: BudgetPeriod) -> bool {
        match period {
            BudgetPeriod::Daily => self.daily_exhausted,
            BudgetPeriod::Monthly => self.monthly_exhausted,
        }
    }

    /// Reset any period whose key no longer matches `now`.
    pub fn roll_periods(&mut self, now: DateTime<Utc>) {
        let day = daily_key(now);
        if self.daily_key != day {
            if !self.daily_key.is_empty() {
                tracing::debug!(from = %self.daily_key, to = %day, "Daily spend rolled over");
            }
            self.daily_key = day;
            self.daily_usd = 0.0;
            self.last_daily_alert = 0.0;
            self.daily_exhausted = false;
        }

        let month = monthly_key(now);
        if self.monthly_key != month {
            if !self.monthly_key.is_empty() {
                tracing::debug!(from = %self.monthly_key, to = %month, "Monthly spend rolled over");
            }
            self.monthly_key = month;
            self.monthly_usd = 0.0;
            self.last_monthly_alert = 0.0;
            self.monthly_exhausted = false;
        }
    }

    /// Pre-call check: with hard stop on, a period whose spend has already
    /// reached its budget, or that was marked exhausted, blocks further calls.
    pub fn budget_check(&mut self, now: DateTime<Utc>) -> Result<(), BudgetExhausted> {
        self.roll_periods(now);
        if !self.hard_stop {
            return Ok(());
        }
        for (period, spent, budget) in self.periods() {
            if let Some(budget) = budget {
                if spent >= budget || self.is_exhausted(period) {
                    return Err(BudgetExhausted {
                        period,
                        spent,
                        budget,
                    });
                }
            }
        }
        Ok(())
    }

    /// Record a spend against every total.
    ///
    /// With hard stop on, a spend that would push a period strictly past its
    /// budget is declined and nothing changes. Negative or non-finite amounts
    /// are rejected the same way. Returned alerts list every threshold newly
    /// crossed by this spend, per period.
    pub fn record_spend(
        &mut self,
        amount_usd: f64,
        model: &str,
        feature: &str,
        now: DateTime<Utc>,
    ) -> SpendOutcome {
        if !amount_usd.is_finite() || amount_usd < 0.0 {
            tracing::warn!(amount_usd, model, feature, "Rejected invalid spend amount");
            return SpendOutcome::invalid(amount_usd);
        }

        self.roll_periods(now);

        if self.hard_stop {
            for (period, spent, budget) in self.periods() {
                if let Some(budget) = budget {
                    let would_total = spent + amount_usd;
                    if would_total > budget {
                        return SpendOutcome::declined(period, would_total, budget);
                    }
                }
            }
        }

        self.daily_usd += amount_usd;
        self.monthly_usd += amount_usd;
        *self.by_model.entry(model.to_string()).or_insert(0.0) += amount_usd;
        *self.by_feature.entry(feature.to_string()).or_insert(0.0) += amount_usd;

        let mut alerts = crossed_thresholds(
            BudgetPeriod::Daily,
            &self.thresholds,
            &mut self.last_daily_alert,
            self.daily_usd,
            self.budget_daily_usd,
        );
        alerts.extend(crossed_thresholds(
            BudgetPeriod::Monthly,
            &self.thresholds,
            &mut self.last_monthly_alert,
            self.monthly_usd,
            self.budget_monthly_usd,
        ));

        SpendOutcome::recorded(alerts)
    }

    /// Budget left in a period, if that period has a budget.
    pub fn remaining(&self, period: BudgetPeriod) -> Option<f64> {
        match period {
            BudgetPeriod::Daily => self.budget_daily_usd.map(|b| (b - self.daily_usd).max(0.0)),
            BudgetPeriod::Monthly => self
                .budget_monthly_usd
                .map(|b| (b - self.monthly_usd).max(0.0)),
        }
    }

    fn periods(&self) -> [(BudgetPeriod, f64, Option<f64>); 2] {
        [
            (BudgetPeriod::Daily, self.daily_usd, self.budget_daily_usd),
            (
                BudgetPeriod::Monthly,
                self.monthly_usd,
                self.budget_monthly_usd,
            ),
        ]
    }
}

fn crossed_thresholds(
    period: BudgetPeriod,
    thresholds: &[f64],
    watermark: &mut f64,
    spent: f64,
    budget: Option<f64>,
) -> Vec<BudgetAlert> {
    let Some(budget) = budget.filter(|b| *b > 0.0) else {
        return Vec::new();
    };
    let ratio = spent / budget;

    let mut sorted = thresholds.to_vec();
    sorted.sort_by(f64::total_cmp);

    let alerts: Vec<BudgetAlert> = sorted
        .into_iter()
        .filter(|t| *t > *watermark && ratio >= *t)
        .map(|threshold| BudgetAlert {
            period,
            threshold,
            spent,
            budget,
        })
        .collect();

    if let Some(last) = alerts.last() {
        *watermark = last.threshold;
    }
    alerts
}
