//! Spend accounting.
//!
//! - [`ledger`]: per-bot spend totals, budgets, alerts and hard stop
//! - [`pricing`]: USD cost estimation from token usage

pub mod ledger;
pub mod pricing;

pub use ledger::BillingLedger;
