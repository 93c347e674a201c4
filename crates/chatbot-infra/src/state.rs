//! JSON file implementation of [`StateRepository`].
//!
//! The whole state document lives in one pretty-printed JSON file. Saves write
//! a sibling `*.tmp` file and rename it over the original, so a crash mid-save
//! leaves the previous document intact.

use std::path::{Path, PathBuf};

use chatbot_core::store::{StateDocument, StateRepository};
use chatbot_types::error::StoreError;

/// Default state file name inside the data directory.
pub const STATE_FILE: &str = "state.json";

pub struct JsonFileStateRepository {
    path: PathBuf,
}

impl JsonFileStateRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository for `{data_dir}/state.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

impl StateRepository for JsonFileStateRepository {
    async fn load(&self) -> Result<StateDocument, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting empty", self.path.display());
                return Ok(StateDocument::default());
            }
            Err(err) => return Err(io_error(&self.path, err)),
        };

        if content.trim().is_empty() {
            return Ok(StateDocument::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, document: &StateDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        tracing::trace!("Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbot_types::chat::ChatMessage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty_document() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStateRepository::in_data_dir(tmp.path());
        assert_eq!(repo.load().await.unwrap(), StateDocument::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStateRepository::new(tmp.path().join("nested").join("state.json"));

        let mut document = StateDocument::default();
        document
            .chats
            .entry("c1".into())
            .or_default()
            .push_exchange(ChatMessage::user("hi"), ChatMessage::assistant("hello"));
        document.billing.budget_daily_usd = Some(5.0);
        repo.save(&document).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), document);
        assert!(!repo.tmp_path().exists(), "temporary file is renamed away");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(repo.path()).unwrap()).unwrap();
        assert_eq!(raw["billing"]["budget_daily_usd"], 5.0);
        assert!(raw["rate_windows_by_bot"].is_object());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStateRepository::in_data_dir(tmp.path());
        tokio::fs::write(repo.path(), "{ not json").await.unwrap();
        assert!(matches!(repo.load().await, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_tmp_path_is_sibling() {
        let repo = JsonFileStateRepository::new("/data/state.json");
        assert_eq!(repo.tmp_path(), PathBuf::from("/data/state.json.tmp"));
    }
}
