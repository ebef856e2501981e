use crate::profile::{ProfileError, ProfileSet};
use crate::store::DEFAULT_MAX_RULES;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error(transparent)]
    ProfileError(#[from] ProfileError),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Where compiled rules are installed
    pub rule_store: RuleStoreConfig,
    /// Profiles and the active selection
    #[serde(flatten)]
    pub profiles: ProfileSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: text, json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleStoreConfig {
    /// JSON file holding the installed rules
    pub path: String,
    /// Maximum number of installed rules
    pub max_rules: usize,
}

impl Default for RuleStoreConfig {
    fn default() -> Self {
        Self {
            path: "~/.chheader/rules.json".to_string(),
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.profiles.normalize();
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a default configuration file with an active sample profile
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Config {
            profiles: ProfileSet::with_sample(),
            ..Config::default()
        };
        config.save(path)?;
        Ok(config)
    }

    /// Expand tilde in paths
    pub fn expand_paths(&mut self) {
        if let Some(home) = dirs_home() {
            if self.rule_store.path.starts_with('~') {
                self.rule_store.path = self.rule_store.path.replacen('~', &home, 1);
            }
        }
    }

    /// Select the active profile by id
    pub fn activate(&mut self, id: &str) -> Result<(), ConfigError> {
        self.profiles.set_active(id)?;
        Ok(())
    }

    /// Activate a profile in the file at `path`, leaving the rest of its
    /// content as written (no runtime overrides, no expanded paths)
    pub fn activate_saved<P: AsRef<Path>>(path: P, id: &str) -> Result<Self, ConfigError> {
        let mut stored = Config::load(&path)?;
        stored.activate(id)?;
        stored.save(&path)?;
        Ok(stored)
    }
}

fn dirs_home() -> Option<String> {
    std::env::var("HOME").ok()
}
