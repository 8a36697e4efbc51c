//! Runtime configuration, loaded from a TOML
//! file as a single `[config]` table a deployment
//! edits directly rather than a hand-picked preset constant.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PointError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDurability {
    /// Notifier queues are backed by an on-disk log and survive restart.
    Durable,
    /// Notifier queues live only in memory.
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiverMode {
    /// Every store update is archived immediately.
    JustInTime,
    /// Updates are buffered and archived on the configured schedule.
    Scheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of points a single batch evaluates before yielding.
    pub batch_size_limit: usize,
    pub queue_durability: QueueDurability,
    pub archiver_mode: ArchiverMode,
    /// Cron expression for `ArchiverMode::Scheduled`; ignored otherwise.
    pub archiver_schedule: Option<String>,
    /// Result-value cache capacity per batch run.
    pub cache_size: usize,
    /// Default retention window, in days, used by `pointd purge` when no
    /// `--before` is given.
    pub retention_days: u32,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            batch_size_limit: 10_000,
            queue_durability: QueueDurability::Durable,
            archiver_mode: ArchiverMode::JustInTime,
            archiver_schedule: None,
            cache_size: 4_096,
            retention_days: 90,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PointError::BadParameter(format!("bad config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_durable_and_jit() {
        let cfg = Config::default();
        assert_eq!(cfg.queue_durability, QueueDurability::Durable);
        assert_eq!(cfg.archiver_mode, ArchiverMode::JustInTime);
    }

    #[test]
    fn parses_a_minimal_toml_table() {
        let cfg = Config::from_toml_str(
            r#"
            batch_size_limit = 500
            queue_durability = "ephemeral"
            archiver_mode = "scheduled"
            archiver_schedule = "0 * * * *"
            cache_size = 128
            retention_days = 30
            data_dir = "/var/lib/pointflow"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.batch_size_limit, 500);
        assert_eq!(cfg.queue_durability, QueueDurability::Ephemeral);
        assert_eq!(cfg.archiver_schedule.as_deref(), Some("0 * * * *"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::from_toml_str("not valid = = toml").is_err());
    }
}
