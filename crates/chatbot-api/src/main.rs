mod cli;
mod state;

use clap::Parser;

use chatbot_core::broker::TurnRequest;
use chatbot_infra::config::{LogEnv, load_app_config, resolve_data_dir};
use chatbot_observe::redact::Redactor;
use chatbot_observe::tracing_setup::{
    LogFormat, TracingOptions, init_tracing, parse_module_levels, resolve_level, shutdown_tracing,
};
use chatbot_types::config::{LoggingConfig, TraceMode};

use cli::{BudgetCommand, Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir();
    let config = load_app_config(&data_dir).await;
    let env = LogEnv::from_env();
    let redactor = Redactor::from_env();

    let options = tracing_options(&cli, &env, &config.logging);
    if let Err(e) = init_tracing(&options, redactor.clone()) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }
    let trace_mode = trace_mode(&cli, &env, &config.logging);

    let needs_provider = matches!(
        cli.command,
        Commands::Ask { .. } | Commands::Judge { .. } | Commands::Moderate { .. }
    );
    let state = AppState::init(data_dir, config, trace_mode, redactor, needs_provider).await?;

    let json = cli.json;
    let result = match cli.command {
        Commands::Ask {
            text,
            target,
            user,
            guild,
            not_addressed,
            instructions,
        } => {
            let request = TurnRequest {
                bot_id: target.bot,
                channel_id: target.channel,
                user_id: user,
                guild_id: guild,
                text,
                addressed: !not_addressed,
                instructions,
            };
            cli::chat::ask(&state, request, json).await
        }
        Commands::Judge { text, target } => {
            cli::chat::judge(&state, &target.bot, &target.channel, text, json).await
        }
        Commands::Moderate { text } => cli::chat::moderate(&state, &text, json).await,
        Commands::Budget { action } => match action {
            BudgetCommand::Show { bot } => cli::budget::show(&state, bot.as_deref(), json).await,
            BudgetCommand::Set {
                bot,
                daily,
                monthly,
            } => cli::budget::set(&state, bot.as_deref(), daily, monthly, json).await,
        },
        Commands::Reset { channel, all } => match channel {
            Some(channel) if !all => cli::reset::reset_channel(&state, &channel, json).await,
            _ => cli::reset::reset_all(&state, json).await,
        },
    };

    shutdown_tracing();
    result
}

/// Logging options from flags, then `LLM_*` variables, then `config.toml`.
fn tracing_options(cli: &Cli, env: &LogEnv, config: &LoggingConfig) -> TracingOptions {
    let env_level = env.level.as_deref().or(config.level.as_deref());
    let format = cli
        .log_format
        .as_deref()
        .or(env.format.as_deref())
        .or(config.format.as_deref())
        .map(LogFormat::parse)
        .unwrap_or_default();
    let module_levels = cli
        .log_levels
        .as_deref()
        .or(env.levels.as_deref())
        .or(config.levels.as_deref())
        .map(parse_module_levels)
        .unwrap_or_default();

    TracingOptions {
        level: resolve_level(cli.log_level.as_deref(), cli.verbose, cli.quiet, env_level),
        format,
        module_levels,
        otel: cli.otel || config.otel,
    }
}

/// Provider call tracing mode from the flag, then `LLM_TRACE_OPENAI`, then config.
fn trace_mode(cli: &Cli, env: &LogEnv, config: &LoggingConfig) -> TraceMode {
    cli.trace_openai
        .as_deref()
        .or(env.trace_openai.as_deref())
        .map(TraceMode::parse_lenient)
        .or(config.trace_openai)
        .unwrap_or_default()
}
