//! Commands that call the model: ask, judge, moderate.

use anyhow::Result;
use console::style;

use chatbot_core::billing::pricing::format_cost;
use chatbot_core::broker::{JudgeOutcome, TurnOutcome, TurnRequest};
use chatbot_core::llm::{JudgeStatus, ModerationOutcome};
use chatbot_types::chat::ChatMessage;

use crate::state::AppState;

/// Send one message through the broker and print the outcome.
pub async fn ask(state: &AppState, request: TurnRequest, json: bool) -> Result<()> {
    let outcome = state.broker.chat_turn(request).await?;

    if json {
        let value = match &outcome {
            TurnOutcome::Replied(reply) => serde_json::json!({
                "status": "replied",
                "text": reply.text,
                "model": reply.model,
                "path": reply.path.as_str(),
                "usage": {
                    "input_tokens": reply.usage.input_tokens,
                    "output_tokens": reply.usage.output_tokens,
                    "cached_input_tokens": reply.usage.cached_input_tokens,
                },
                "cost_usd": reply.cost_usd,
                "alerts": reply.spend.alerts,
            }),
            TurnOutcome::BudgetExceeded(exhausted) => serde_json::json!({
                "status": "budget_exceeded",
                "period": exhausted.period,
                "spent": exhausted.spent,
                "budget": exhausted.budget,
            }),
            TurnOutcome::RateLimited { dimension } => serde_json::json!({
                "status": "rate_limited",
                "dimension": dimension,
            }),
            TurnOutcome::Blocked { categories } => serde_json::json!({
                "status": "blocked",
                "categories": categories,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        TurnOutcome::Replied(reply) => {
            println!("{}", reply.text);
            println!();
            println!(
                "  {} {} via {} | {} in / {} out | {}",
                style("·").dim(),
                style(&reply.model).cyan(),
                reply.path,
                reply.usage.input_tokens,
                reply.usage.output_tokens,
                format_cost(reply.cost_usd),
            );
            for alert in &reply.spend.alerts {
                println!(
                    "  {} {} spend at {:.0}% of ${:.2}",
                    style("!").yellow().bold(),
                    alert.period,
                    alert.percent(),
                    alert.budget
                );
            }
        }
        TurnOutcome::BudgetExceeded(exhausted) => {
            println!(
                "{} {} budget reached (${:.2} of ${:.2})",
                style("✗").red().bold(),
                exhausted.period,
                exhausted.spent,
                exhausted.budget
            );
        }
        TurnOutcome::RateLimited { dimension } => {
            println!(
                "{} Rate limited on {}, try again shortly",
                style("✗").yellow().bold(),
                style(dimension).bold()
            );
        }
        TurnOutcome::Blocked { categories } => {
            println!(
                "{} Message blocked by moderation: {}",
                style("✗").red().bold(),
                categories.join(", ")
            );
        }
    }
    Ok(())
}

/// Ask the judge about a channel, optionally with a pending message.
pub async fn judge(
    state: &AppState,
    bot_id: &str,
    channel_id: &str,
    text: Option<String>,
    json: bool,
) -> Result<()> {
    let pending = text.map(ChatMessage::user);
    let outcome = state.broker.judge(bot_id, channel_id, pending).await?;

    let verdict = match outcome {
        JudgeOutcome::Judged(verdict) => verdict,
        JudgeOutcome::BudgetExceeded(exhausted) => {
            if json {
                let value = serde_json::json!({
                    "status": "budget_exceeded",
                    "period": exhausted.period,
                    "spent": exhausted.spent,
                    "budget": exhausted.budget,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "{} {} budget reached, judge skipped",
                    style("✗").red().bold(),
                    exhausted.period
                );
            }
            return Ok(());
        }
    };

    let (status, path, model) = match &verdict.status {
        JudgeStatus::Decided { path, model } => ("decided", Some(*path), Some(model.as_str())),
        JudgeStatus::Malformed { path, model } => ("malformed", Some(*path), Some(model.as_str())),
        JudgeStatus::Unavailable => ("unavailable", None, None),
    };

    if json {
        let value = serde_json::json!({
            "status": status,
            "intervene": verdict.decision.intervene,
            "intent": verdict.decision.intent,
            "confidence": verdict.decision.confidence,
            "path": path.map(|p| p.as_str()),
            "model": model,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let answer = if verdict.decision.intervene {
        style("intervene").green().bold()
    } else {
        style("stay quiet").dim()
    };
    println!(
        "  {} ({}, confidence {:.2})",
        answer, verdict.decision.intent, verdict.decision.confidence
    );
    match (path, model) {
        (Some(path), Some(model)) => println!("  {} {status} by {model} via {path}", style("·").dim()),
        _ => println!("  {} judge unavailable", style("·").dim()),
    }
    Ok(())
}

/// Moderate text and print whether it is allowed.
pub async fn moderate(state: &AppState, text: &str, json: bool) -> Result<()> {
    let outcome = state.broker.moderate(text).await;

    if json {
        let value = match &outcome {
            ModerationOutcome::Allowed => serde_json::json!({ "allowed": true }),
            ModerationOutcome::Flagged { categories } => serde_json::json!({
                "allowed": false,
                "categories": categories,
            }),
            ModerationOutcome::Unavailable { reason } => serde_json::json!({
                "allowed": true,
                "unavailable": reason,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        ModerationOutcome::Allowed => println!("{} Allowed", style("✓").green().bold()),
        ModerationOutcome::Flagged { categories } => println!(
            "{} Flagged: {}",
            style("✗").red().bold(),
            categories.join(", ")
        ),
        ModerationOutcome::Unavailable { reason } => println!(
            "{} Allowed (moderation unavailable: {reason})",
            style("?").yellow().bold()
        ),
    }
    Ok(())
}
