//! Tracing subscriber initialization with redacted output and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use chatbot_observe::redact::Redactor;
//! use chatbot_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! let opts = TracingOptions::default();
//! init_tracing(&opts, Redactor::from_env()).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

use crate::redact::{RedactingMakeWriter, Redactor};

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; everything else is text.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Resolved logging options.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    pub level: Level,
    pub format: LogFormat,
    /// Per-target overrides, applied on top of `level`.
    pub module_levels: Vec<(String, Level)>,
    pub otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            module_levels: Vec::new(),
            otel: false,
        }
    }
}

/// Parse a level name. Accepts the Python-style names `WARNING` and `CRITICAL`.
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}

/// Resolve the base level.
///
/// Precedence: explicit flag, then the `LLM_LOG_LEVEL` value, then the
/// verbosity flags (`-vv` debug, `-v` info, `-q` warn), then info. An
/// unrecognized explicit level means info; an unrecognized env level is ignored.
pub fn resolve_level(
    explicit: Option<&str>,
    verbose: u8,
    quiet: bool,
    env_level: Option<&str>,
) -> Level {
    if let Some(explicit) = explicit.filter(|s| !s.trim().is_empty()) {
        return parse_level(explicit).unwrap_or(Level::INFO);
    }
    if let Some(level) = env_level.and_then(parse_level) {
        return level;
    }
    match verbose {
        0 if quiet => Level::WARN,
        0 | 1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Parse `target=LEVEL[,target=LEVEL...]`. Invalid entries are skipped.
pub fn parse_module_levels(directives: &str) -> Vec<(String, Level)> {
    directives
        .split(',')
        .filter_map(|part| {
            let (name, level) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), parse_level(level)?))
        })
        .collect()
}

/// Build the filter: the base level plus one directive per module override.
pub fn build_env_filter(opts: &TracingOptions) -> EnvFilter {
    let directives = opts
        .module_levels
        .iter()
        .map(|(target, level)| format!("{target}={}", level.as_str().to_lowercase()))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(opts.level).into())
        .parse_lossy(directives)
}

/// Initialize the global tracing subscriber.
///
/// - Installs one `fmt` layer (text or JSON) writing to stdout through a
///   [`RedactingMakeWriter`].
/// - When `opts.otel` is true, additionally bridges spans to OpenTelemetry
///   using a stdout exporter.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(
    opts: &TracingOptions,
    redactor: Redactor,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let writer = RedactingMakeWriter::new(std::io::stdout, redactor);

    let text_layer = (opts.format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(writer.clone())
    });
    let json_layer = (opts.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer.clone())
    });

    let otel_layer = if opts.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("chatbot");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(build_env_filter(opts))
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_precedence() {
        assert_eq!(resolve_level(None, 0, true, None), Level::WARN);
        assert_eq!(resolve_level(None, 2, false, None), Level::DEBUG);
        assert_eq!(resolve_level(None, 1, false, None), Level::INFO);
        assert_eq!(resolve_level(Some("error"), 2, false, None), Level::ERROR);
        assert_eq!(resolve_level(None, 0, false, Some("debug")), Level::DEBUG);
        assert_eq!(resolve_level(None, 0, false, None), Level::INFO);
    }

    #[test]
    fn test_env_level_beats_verbosity_flags() {
        assert_eq!(resolve_level(None, 2, false, Some("ERROR")), Level::ERROR);
        assert_eq!(resolve_level(None, 0, true, Some("bogus")), Level::WARN);
        assert_eq!(resolve_level(Some("nonsense"), 0, false, Some("debug")), Level::INFO);
    }

    #[test]
    fn test_parse_level_python_names() {
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level("critical"), Some(Level::ERROR));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_parse_module_levels_skips_invalid() {
        let levels = parse_module_levels(
            "chatbot_core::llm=DEBUG, chatbot_infra=WARNING,foo=INVALID,noequals,=info",
        );
        assert_eq!(
            levels,
            vec![
                ("chatbot_core::llm".to_string(), Level::DEBUG),
                ("chatbot_infra".to_string(), Level::WARN),
            ]
        );
        assert!(parse_module_levels("").is_empty());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Text);
    }

    #[test]
    fn test_env_filter_includes_module_directives() {
        let opts = TracingOptions {
            level: Level::WARN,
            module_levels: vec![("chatbot_core::llm".to_string(), Level::DEBUG)],
            ..Default::default()
        };
        let filter = build_env_filter(&opts).to_string();
        assert!(filter.contains("chatbot_core::llm=debug"), "filter: {filter}");
        assert!(filter.contains("warn"), "filter: {filter}");
    }
}
