//! CLI command definitions for the `chatbot` binary.
//!
//! Uses clap derive macros. Logging flags are global so they can follow any
//! subcommand.

pub mod budget;
pub mod chat;
pub mod reset;

use clap::{Parser, Subcommand};

/// Operate the chatbot broker from a terminal.
#[derive(Parser)]
#[command(name = "chatbot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More logging (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit log level (TRACE, DEBUG, INFO, WARNING, ERROR). Overrides -v/-q.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format: text or json.
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Per-target levels, e.g. `chatbot::trace=DEBUG,reqwest=WARN`.
    #[arg(long, global = true)]
    pub log_levels: Option<String>,

    /// Provider call tracing: off, meta or full.
    #[arg(long, global = true)]
    pub trace_openai: Option<String>,

    /// Also export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message through the broker and print the reply.
    Ask {
        /// Message text.
        text: String,

        #[command(flatten)]
        target: TargetArgs,

        /// User id used for rate limiting.
        #[arg(long, default_value = "cli-user")]
        user: String,

        /// Guild id used for rate limiting.
        #[arg(long)]
        guild: Option<String>,

        /// Mark the message as not addressed to the bot.
        #[arg(long)]
        not_addressed: bool,

        /// Instructions placed before the history.
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Ask the judge whether the bot should join the conversation.
    Judge {
        /// An incoming message not yet in the channel history.
        text: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Moderate a piece of text.
    Moderate {
        text: String,
    },

    /// Show or change spending budgets.
    Budget {
        #[command(subcommand)]
        action: BudgetCommand,
    },

    /// Clear channel history.
    Reset {
        /// Channel to clear.
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        channel: Option<String>,

        /// Clear every channel.
        #[arg(long)]
        all: bool,
    },
}

/// Which bot and channel a command acts on.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Bot identity (each bot has its own ledger and rate buckets).
    #[arg(long, default_value = "default")]
    pub bot: String,

    /// Channel id.
    #[arg(long, default_value = "cli")]
    pub channel: String,
}

#[derive(Subcommand)]
pub enum BudgetCommand {
    /// Show spend and budgets.
    Show {
        /// A single bot's ledger; the base ledger and every bot when omitted.
        #[arg(long)]
        bot: Option<String>,
    },

    /// Set budgets. Omitted values are left unchanged.
    Set {
        /// Bot whose ledger to change; the base ledger when omitted.
        #[arg(long)]
        bot: Option<String>,

        /// Daily budget in USD.
        #[arg(long)]
        daily: Option<f64>,

        /// Monthly budget in USD.
        #[arg(long)]
        monthly: Option<f64>,
    },
}
