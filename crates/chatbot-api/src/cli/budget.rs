//! Budget inspection and management.

use anyhow::Result;
use console::style;

use chatbot_core::billing::BillingLedger;
use chatbot_core::billing::pricing::format_cost;
use chatbot_types::billing::BudgetPeriod;

use crate::state::AppState;

/// Show the base ledger and every bot's ledger, or a single bot's.
pub async fn show(state: &AppState, bot: Option<&str>, json: bool) -> Result<()> {
    let mut ledgers: Vec<(String, BillingLedger)> = Vec::new();
    match bot {
        Some(id) => ledgers.push((id.to_string(), state.broker.ledger(Some(id)).await)),
        None => {
            ledgers.push(("base".to_string(), state.broker.ledger(None).await));
            for id in state.broker.bot_ids().await {
                let ledger = state.broker.ledger(Some(&id)).await;
                ledgers.push((id, ledger));
            }
        }
    }

    if json {
        let mut value = serde_json::Map::new();
        for (id, ledger) in &ledgers {
            value.insert(id.clone(), serde_json::to_value(ledger)?);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (id, ledger) in &ledgers {
        println!();
        println!("  {}", style(format!("── {id} ──")).dim());
        print_period(ledger, BudgetPeriod::Daily);
        print_period(ledger, BudgetPeriod::Monthly);
        if !ledger.by_feature.is_empty() {
            let features: Vec<String> = ledger
                .by_feature
                .iter()
                .map(|(feature, cost)| format!("{feature} {}", format_cost(*cost)))
                .collect();
            println!("  Features: {}", features.join(", "));
        }
        if !ledger.by_model.is_empty() {
            let models: Vec<String> = ledger
                .by_model
                .iter()
                .map(|(model, cost)| format!("{model} {}", format_cost(*cost)))
                .collect();
            println!("  Models:   {}", models.join(", "));
        }
        if !ledger.hard_stop {
            println!("  {}", style("hard stop disabled").yellow());
        }
    }
    println!();
    Ok(())
}

fn print_period(ledger: &BillingLedger, period: BudgetPeriod) {
    let (label, spent, budget) = match period {
        BudgetPeriod::Daily => ("Daily:   ", ledger.daily_usd, ledger.budget_daily_usd),
        BudgetPeriod::Monthly => ("Monthly: ", ledger.monthly_usd, ledger.budget_monthly_usd),
    };
    match (budget, ledger.remaining(period)) {
        (Some(budget), Some(remaining)) => {
            let left = if remaining > 0.0 && !ledger.is_exhausted(period) {
                style(format!("${remaining:.2} left")).green()
            } else {
                style("exhausted".to_string()).red()
            };
            println!("  {label} ${spent:.4} of ${budget:.2} ({left})");
        }
        _ => println!("  {label} ${spent:.4} {}", style("(no budget)").dim()),
    }
}

/// Update budgets for the base ledger or one bot.
pub async fn set(
    state: &AppState,
    bot: Option<&str>,
    daily: Option<f64>,
    monthly: Option<f64>,
    json: bool,
) -> Result<()> {
    for value in [daily, monthly].into_iter().flatten() {
        if !value.is_finite() || value < 0.0 {
            anyhow::bail!("Budgets must be non-negative numbers, got {value}");
        }
    }
    if daily.is_none() && monthly.is_none() {
        anyhow::bail!("Nothing to set: pass --daily and/or --monthly");
    }

    state.broker.set_budgets(bot, daily, monthly).await?;
    let ledger = state.broker.ledger(bot).await;

    if json {
        let value = serde_json::json!({
            "bot": bot.unwrap_or("base"),
            "budget_daily_usd": ledger.budget_daily_usd,
            "budget_monthly_usd": ledger.budget_monthly_usd,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} Budgets updated for {}",
        style("✓").green().bold(),
        style(bot.unwrap_or("base")).bold()
    );
    print_period(&ledger, BudgetPeriod::Daily);
    print_period(&ledger, BudgetPeriod::Monthly);
    Ok(())
}
