//! Channel history reset.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Clear one channel's history.
pub async fn reset_channel(state: &AppState, channel_id: &str, json: bool) -> Result<()> {
    let existed = state.broker.reset_channel(channel_id).await?;

    if json {
        let value = serde_json::json!({ "channel": channel_id, "cleared": existed });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if existed {
        println!(
            "{} Cleared history for {}",
            style("✓").green().bold(),
            style(channel_id).bold()
        );
    } else {
        println!("{} No history for {channel_id}", style("·").dim());
    }
    Ok(())
}

/// Clear every channel's history.
pub async fn reset_all(state: &AppState, json: bool) -> Result<()> {
    let cleared = state.broker.reset_all().await?;

    if json {
        let value = serde_json::json!({ "cleared": cleared });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} Cleared {} channel(s) in {}",
        style("✓").green().bold(),
        cleared,
        state.data_dir.display()
    );
    Ok(())
}
