//! Configuration loading for the chatbot.
//!
//! Reads `config.toml` from the data directory (`~/.chatbot/` by default) into
//! [`AppConfig`], falling back to defaults when the file is missing or
//! malformed. Also resolves the data directory, the API key and the `LLM_*`
//! logging environment variables.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use chatbot_types::config::AppConfig;

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CHATBOT_DATA_DIR";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable or unparseable file: a warning and the default.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `CHATBOT_DATA_DIR` environment variable
/// 2. `~/.chatbot`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatbot");
    }

    // Last resort: current directory
    PathBuf::from(".chatbot")
}

/// API key from `OPENAI_API_KEY`, if set and non-empty.
pub fn api_key_from_env() -> Option<SecretString> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
}

/// Logging settings supplied through `LLM_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEnv {
    /// `LLM_LOG_LEVEL`
    pub level: Option<String>,
    /// `LLM_LOG_FORMAT`
    pub format: Option<String>,
    /// `LLM_LOG_LEVELS`
    pub levels: Option<String>,
    /// `LLM_TRACE_OPENAI`
    pub trace_openai: Option<String>,
}

impl LogEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the variables through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            level: get("LLM_LOG_LEVEL"),
            format: get("LLM_LOG_FORMAT"),
            levels: get("LLM_LOG_LEVELS"),
            trace_openai: get("LLM_TRACE_OPENAI"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbot_types::config::TraceMode;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_app_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.models.chat, "gpt-5-mini");
        assert!(config.pricing.is_empty());
        assert_eq!(config.rate_limits["user"][0].max_events, 6);
    }

    #[tokio::test]
    async fn load_app_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[models]
chat = "gpt-4.1-mini"

[completion]
reasoning = "low"
truncation = "auto"

[budget]
daily_usd = 2.5
thresholds = [0.9]

[rate_limits]
guild = [{ window_seconds = 10, max_events = 3 }]

[logging]
trace_openai = "full"

[[pricing]]
model_pattern = "my-model"
input_cost_per_million = 1.0
output_cost_per_million = 2.0
"#,
        )
        .await
        .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.models.chat, "gpt-4.1-mini");
        assert_eq!(config.models.judge, "gpt-5-nano");
        assert_eq!(config.budget.daily_usd, Some(2.5));
        assert_eq!(config.budget.thresholds, vec![0.9]);
        assert!(config.budget.hard_stop);
        assert_eq!(config.rate_limits.len(), 1, "listed dimensions replace the defaults");
        assert_eq!(config.rate_limits["guild"][0].window_seconds, 10.0);
        assert_eq!(config.logging.trace_openai, Some(TraceMode::Full));
        assert_eq!(config.pricing[0].model_pattern, "my-model");
        assert!(config.completion.verbosity.is_none());
    }

    #[tokio::test]
    async fn load_app_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_app_config(tmp.path()).await;
        assert_eq!(config.models.chat, "gpt-5-mini");
    }

    #[test]
    fn log_env_ignores_blank_values() {
        let vars = HashMap::from([
            ("LLM_LOG_LEVEL", "DEBUG"),
            ("LLM_LOG_FORMAT", "  "),
            ("LLM_TRACE_OPENAI", "off"),
        ]);
        let env = LogEnv::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(
            env,
            LogEnv {
                level: Some("DEBUG".into()),
                format: None,
                levels: None,
                trace_openai: Some("off".into()),
            }
        );
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-chatbot");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-chatbot"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
