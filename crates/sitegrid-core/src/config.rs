//! sitegrid.toml configuration parser.
//!
//! Tunables for the controller loop. All fields are optional in the
//! file; missing values fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteGridConfig {
    #[serde(default)]
    pub controller: ControllerTuning,
}

/// Controller loop tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerTuning {
    /// Number of reconcile workers draining the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Base requeue backoff in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Maximum requeue backoff in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Immediate retries on a write conflict before requeueing.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    /// Full resync interval in seconds (0 disables).
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_workers() -> usize {
    4
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_conflict_retries() -> u32 {
    3
}
fn default_resync_interval_secs() -> u64 {
    300
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            conflict_retries: default_conflict_retries(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

impl SiteGridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Errors loading the daemon configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_missing() {
        let config: SiteGridConfig = toml::from_str("").unwrap();
        assert_eq!(config.controller.workers, 4);
        assert_eq!(config.controller.backoff_base_ms, 200);
        assert_eq!(config.controller.backoff_max_ms, 30_000);
        assert_eq!(config.controller.conflict_retries, 3);
    }

    #[test]
    fn partial_override() {
        let config: SiteGridConfig = toml::from_str(
            r#"
            [controller]
            workers = 8
            resync_interval_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.controller.workers, 8);
        assert_eq!(config.controller.resync_interval_secs, 60);
        assert_eq!(config.controller.backoff_base_ms, 200);
    }
}
