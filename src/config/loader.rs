//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/polar/)
    Project = 1,
    /// User-level config (~/.polar/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: POLAR_USER_DIR or ~/.polar
        let user_dir = std::env::var("POLAR_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".polar")));

        // Project dir: POLAR_PROJECT_DIR or $CWD/polar
        let project_dir = std::env::var("POLAR_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("polar")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Highest-priority config file that contributed, if any
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with(ConfigPaths::discover(), |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths, reading the process environment.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with(paths, |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and environment lookup.
    pub fn load_with(paths: ConfigPaths, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Check for explicit config path override
        if let Some(explicit_path) = env("POLAR_CONFIG_PATH") {
            let path = PathBuf::from(&explicit_path);
            let config = Config::load(&path)?;
            return Ok(Self {
                paths,
                config,
                config_path: Some(path),
            });
        }

        // Collect configs from each tier
        let mut configs: Vec<Value> = Vec::new();
        let mut config_path = None;

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        // Tiers 2 and 3: project, then user
        let tier_dirs = [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ];
        for (tier, dir) in tier_dirs {
            let Some(dir) = dir else { continue };
            let config_file = dir.join("config.yaml");
            if let Some(value) = read_yaml_tier(tier, &config_file) {
                configs.push(value);
                config_path = Some(config_file);
            }
        }

        // Merge all configs
        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config, &env);
        config.validate()?;

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config, env: &impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = env("POLAR_DB_PATH") {
            config.store.db_path = PathBuf::from(db_path);
        }

        if let Some(hours) = env("POLAR_RECONCILE_INTERVAL_HOURS") {
            match hours.trim().parse::<u64>() {
                Ok(hours) => config.reconciler.interval_hours = hours,
                Err(_) => warn!(
                    tier = %ConfigTier::Environment,
                    value = %hours,
                    "Ignoring invalid POLAR_RECONCILE_INTERVAL_HOURS"
                ),
            }
        }

        if let Some(exact) = env("POLAR_EXACT_TRIGGERS") {
            match parse_flag(&exact) {
                Some(exact) => config.triggers.exact = exact,
                None => warn!(
                    tier = %ConfigTier::Environment,
                    value = %exact,
                    "Ignoring invalid POLAR_EXACT_TRIGGERS"
                ),
            }
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Read one tier's YAML file. A missing file is silently skipped; an
/// unreadable or malformed one is skipped with a warning.
fn read_yaml_tier(tier: ConfigTier, path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(%tier, path = %path.display(), error = %e, "Cannot read config file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%tier, path = %path.display(), error = %e, "Ignoring malformed config file");
            None
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_config_paths_discover() {
        let paths = ConfigPaths::discover();
        assert!(paths.project_dir.is_some());
        // user_dir may or may not exist depending on environment
    }

    #[test]
    fn test_load_defaults_only() {
        // Create empty temp dirs so no config files are found
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        let config = loader.config();

        assert_eq!(config.reconciler.interval_hours, 12);
        assert_eq!(config.triggers.inexact_slack_seconds, 600);
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("polar");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        let project_config = r#"
reconciler:
  interval_hours: 6
  run_on_startup: false
"#;
        std::fs::write(project_dir.join("config.yaml"), project_config).unwrap();

        let user_config = r#"
reconciler:
  interval_hours: 24
"#;
        std::fs::write(user_dir.join("config.yaml"), user_config).unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir.clone()));
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        let config = loader.config();

        // interval from user, run_on_startup from project
        assert_eq!(config.reconciler.interval_hours, 24);
        assert!(!config.reconciler.run_on_startup);
        assert_eq!(loader.config_path(), Some(user_dir.join("config.yaml").as_path()));
    }

    #[test]
    fn test_env_overrides_files() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("polar");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "triggers:\n  exact: true\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("POLAR_DB_PATH", "/tmp/other.db"),
            ("POLAR_RECONCILE_INTERVAL_HOURS", "3"),
            ("POLAR_EXACT_TRIGGERS", "off"),
        ]);
        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader =
            ConfigLoader::load_with(paths, |key| env.get(key).map(|v| v.to_string())).unwrap();
        let config = loader.config();

        assert_eq!(config.store.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.reconciler.interval_hours, 3);
        assert!(!config.triggers.exact);
    }

    #[test]
    fn test_invalid_env_value_is_ignored() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(Some(temp.path().join("polar")), None);
        let loader = ConfigLoader::load_with(paths, |key| {
            (key == "POLAR_RECONCILE_INTERVAL_HOURS").then(|| "soon".to_string())
        })
        .unwrap();
        assert_eq!(loader.config().reconciler.interval_hours, 12);
    }

    #[test]
    fn test_explicit_path_skips_tiers() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("polar");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "triggers:\n  snooze_minutes: 5\n").unwrap();
        let explicit = temp.path().join("explicit.yaml");
        std::fs::write(&explicit, "triggers:\n  snooze_minutes: 15\n").unwrap();

        let explicit_str = explicit.to_string_lossy().to_string();
        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with(paths, |key| {
            (key == "POLAR_CONFIG_PATH").then(|| explicit_str.clone())
        })
        .unwrap();

        assert_eq!(loader.config().triggers.snooze_minutes, 15);
        assert_eq!(loader.config_path(), Some(explicit.as_path()));
    }

    #[test]
    fn test_malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("polar");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "reconciler: [unclosed").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        assert_eq!(loader.config().reconciler.interval_hours, 12);
    }
}
