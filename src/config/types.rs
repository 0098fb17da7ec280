//! Configuration types and structures.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("polar/polar.db")
}

/// Recurrence reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Hours between passes (default: 12).
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Run a pass as soon as the service starts (default: true).
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            run_on_startup: true,
        }
    }
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 60 * 60)
    }
}

fn default_interval_hours() -> u64 {
    12
}

fn default_true() -> bool {
    true
}

/// Trigger facility configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggersConfig {
    /// Whether exact delivery is available (default: true).
    #[serde(default = "default_true")]
    pub exact: bool,

    /// Window that inexact triggers are batched into (default: 600).
    #[serde(default = "default_inexact_slack_seconds")]
    pub inexact_slack_seconds: u64,

    /// Default snooze length in minutes (default: 60).
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: i64,
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            exact: true,
            inexact_slack_seconds: default_inexact_slack_seconds(),
            snooze_minutes: default_snooze_minutes(),
        }
    }
}

impl TriggersConfig {
    pub fn inexact_slack(&self) -> Duration {
        Duration::from_secs(self.inexact_slack_seconds)
    }
}

fn default_inexact_slack_seconds() -> u64 {
    600 // 10 minutes
}

fn default_snooze_minutes() -> i64 {
    60
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub triggers: TriggersConfig,
}

impl Config {
    /// Load configuration from a single file, without tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null.
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reconciler.interval_hours == 0 {
            return Err(anyhow!("reconciler.interval_hours must be at least 1"));
        }
        if self.triggers.snooze_minutes <= 0 {
            return Err(anyhow!("triggers.snooze_minutes must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.reconciler.interval(), Duration::from_secs(12 * 3600));
        assert!(config.reconciler.run_on_startup);
        assert!(config.triggers.exact);
        assert_eq!(config.triggers.inexact_slack(), Duration::from_secs(600));
        assert_eq!(config.triggers.snooze_minutes, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("triggers:\n  exact: false\n").unwrap();
        assert!(!config.triggers.exact);
        assert_eq!(config.triggers.snooze_minutes, 60);
        assert_eq!(config.reconciler.interval_hours, 12);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.reconciler.interval_hours = 0;
        assert!(config.validate().is_err());
    }
}
