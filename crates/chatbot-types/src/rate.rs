//! Rate-limit window configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sliding window: at most `max_events` events in any `window_seconds` span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    pub window_seconds: f64,
    pub max_events: usize,
}

impl RateWindow {
    pub fn new(window_seconds: f64, max_events: usize) -> Self {
        Self {
            window_seconds,
            max_events,
        }
    }

    /// Both bounds must be strictly positive.
    pub fn is_valid(&self) -> bool {
        self.window_seconds > 0.0 && self.window_seconds.is_finite() && self.max_events > 0
    }
}

/// Dimension name (e.g. `user`, `channel`, `guild`) to its ordered windows.
///
/// A dimension absent from the map is unconstrained.
pub type RateLimitConfig = BTreeMap<String, Vec<RateWindow>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_validity() {
        assert!(RateWindow::new(60.0, 5).is_valid());
        assert!(!RateWindow::new(0.0, 5).is_valid());
        assert!(!RateWindow::new(60.0, 0).is_valid());
        assert!(!RateWindow::new(f64::INFINITY, 1).is_valid());
    }

    #[test]
    fn test_config_from_toml() {
        let config: RateLimitConfig = toml::from_str(
            r#"
user = [{ window_seconds = 60.0, max_events = 5 }, { window_seconds = 3600.0, max_events = 50 }]
guild = [{ window_seconds = 10.0, max_events = 20 }]
"#,
        )
        .unwrap();
        assert_eq!(config["user"].len(), 2);
        assert_eq!(config["user"][1].max_events, 50);
        assert!(!config.contains_key("channel"));
    }
}
