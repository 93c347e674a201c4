//! Budget periods and the values a billing ledger hands back to its caller.
//!
//! Alerts are plain data: the ledger returns them in a [`SpendOutcome`] and
//! the caller decides how to surface them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accounting period a budget applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetPeriod::Daily => write!(f, "daily"),
            BudgetPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

/// A budget threshold that was crossed by a recorded spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub period: BudgetPeriod,
    /// Fraction of the budget that was crossed (e.g. `0.8`).
    pub threshold: f64,
    /// Period total after the spend was recorded.
    pub spent: f64,
    pub budget: f64,
}

impl BudgetAlert {
    /// Spend as a percentage of the budget.
    pub fn percent(&self) -> f64 {
        if self.budget > 0.0 {
            self.spent / self.budget * 100.0
        } else {
            0.0
        }
    }
}

/// What the ledger did with a spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpendDecision {
    /// Totals were updated.
    Recorded,
    /// Hard stop: the spend would push a period past its budget. Nothing was recorded.
    Declined {
        period: BudgetPeriod,
        would_total: f64,
        budget: f64,
    },
    /// The amount was negative or not a finite number. Nothing was recorded.
    Invalid { amount: f64 },
}

/// Result of `record_spend`: the decision plus any alerts it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendOutcome {
    pub decision: SpendDecision,
    #[serde(default)]
    pub alerts: Vec<BudgetAlert>,
}

impl SpendOutcome {
    pub fn recorded(alerts: Vec<BudgetAlert>) -> Self {
        Self {
            decision: SpendDecision::Recorded,
            alerts,
        }
    }

    pub fn declined(period: BudgetPeriod, would_total: f64, budget: f64) -> Self {
        Self {
            decision: SpendDecision::Declined {
                period,
                would_total,
                budget,
            },
            alerts: Vec::new(),
        }
    }

    pub fn invalid(amount: f64) -> Self {
        Self {
            decision: SpendDecision::Invalid { amount },
            alerts: Vec::new(),
        }
    }

    /// Whether the spend was accepted.
    pub fn allowed(&self) -> bool {
        matches!(self.decision, SpendDecision::Recorded)
    }
}

/// A period whose budget is already used up, reported by the pre-call check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetExhausted {
    pub period: BudgetPeriod,
    pub spent: f64,
    pub budget: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_allowed() {
        assert!(SpendOutcome::recorded(vec![]).allowed());
        assert!(!SpendOutcome::declined(BudgetPeriod::Daily, 11.0, 10.0).allowed());
        assert!(!SpendOutcome::invalid(-1.0).allowed());
    }

    #[test]
    fn test_alert_percent() {
        let alert = BudgetAlert {
            period: BudgetPeriod::Monthly,
            threshold: 0.5,
            spent: 6.0,
            budget: 10.0,
        };
        assert!((alert.percent() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let json = serde_json::to_value(SpendOutcome::declined(BudgetPeriod::Daily, 11.0, 10.0))
            .unwrap();
        assert_eq!(json["decision"]["status"], "declined");
        assert_eq!(json["decision"]["period"], "daily");
    }
}
