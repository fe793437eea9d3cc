// Configuration Management
//
// This crate handles all configuration loading and management for the gateway.
// It provides:
// - Configuration structs and deserialization
// - File loading logic
// - Validation of per-model settings
//
// This keeps configuration concerns separate from domain logic.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid settings for model '{model}': {reason}")]
    InvalidModelSettings { model: String, reason: String },

    #[error("No settings configured for model '{0}'")]
    MissingModelSettings(String),

    #[error("Invalid conversation settings: {0}")]
    InvalidConversation(String),
}

/// Main configuration loading interface
impl ApiConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ApiConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        // Try different config locations in order
        let config_paths = ["config/config.yaml", "config.yaml", "config/default.yaml"];

        for path in &config_paths {
            if std::path::Path::new(path).exists() {
                return Self::load_from_file(path);
            }
        }

        // If no config file found, fail with descriptive error
        Err(ConfigError::FileNotFound {
            paths: config_paths.join(", "),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, settings) in &self.models.0 {
            settings
                .validate()
                .map_err(|reason| ConfigError::InvalidModelSettings {
                    model: name.clone(),
                    reason,
                })?;
        }
        self.conversation
            .validate()
            .map_err(ConfigError::InvalidConversation)
    }
}

impl ModelsConfig {
    /// Parse per-model settings on their own, without the surrounding service config
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let models: ModelsConfig = serde_yaml::from_str(content)?;
        for name in models.0.keys() {
            models.settings_for(name)?;
        }
        Ok(models)
    }

    /// Validated settings for a model; missing or malformed entries are fatal for that model
    pub fn settings_for(&self, name: &str) -> Result<ModelSettings, ConfigError> {
        let settings = self
            .get(name)
            .ok_or_else(|| ConfigError::MissingModelSettings(name.to_string()))?;
        settings
            .validate()
            .map_err(|reason| ConfigError::InvalidModelSettings {
                model: name.to_string(),
                reason,
            })?;
        Ok(settings.clone())
    }
}
