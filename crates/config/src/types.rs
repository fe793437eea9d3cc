use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-model settings keyed by the registered model name (e.g. "GPT 3.5")
    #[serde(default)]
    pub models: ModelsConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl LoggingConfig {
    /// Filter directive for `tracing_subscriber::EnvFilter`, e.g. `info,api=debug`
    pub fn filter_directive(&self) -> String {
        let mut filter = self.level.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("generative_models".to_string(), "debug".to_string());

        Self {
            level: default_log_level(),
            format: default_log_format(),
            modules,
        }
    }
}

/// Settings of a single generative model.
///
/// Built once per model instance and never mutated afterwards. The credential
/// is kept here but models only expose a redacted copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Provider-side model identifier, also used to pick the tokenizer
    pub model: String,
    /// Maximum tokens the model accepts as prompt + completion
    pub context_window: u32,
    /// Pause between two consecutive dispatched requests, in seconds
    #[serde(default)]
    pub request_pause: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> i64 {
    120
}

impl ModelSettings {
    pub fn new(model: impl Into<String>, context_window: u32, request_pause: f64) -> Self {
        Self {
            model: model.into(),
            context_window,
            request_pause,
            max_tokens: None,
            top_p: None,
            temperature: None,
            api_key: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Pause as a `Duration`; zero when the value is not representable, which
    /// `validate` rejects
    pub fn request_pause_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_pause).unwrap_or_default()
    }

    /// Same settings without the credential
    pub fn redacted(&self) -> Self {
        Self {
            api_key: None,
            ..self.clone()
        }
    }

    /// Check the invariants every model relies on. Returns the reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model identifier must not be empty".to_string());
        }
        if self.context_window == 0 {
            return Err("context_window must be a positive integer".to_string());
        }
        if Duration::try_from_secs_f64(self.request_pause).is_err() {
            return Err(format!(
                "request_pause must be a non-negative number of seconds, got {}",
                self.request_pause
            ));
        }
        if self.max_tokens == Some(0) {
            return Err("max_tokens must be positive".to_string());
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(format!("top_p must be within [0, 1], got {top_p}"));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "temperature must be within [0, 2], got {temperature}"
                ));
            }
        }
        if self.timeout_seconds <= 0 {
            return Err("timeout_seconds must be positive".to_string());
        }
        Ok(())
    }
}

/// Model settings keyed by model name
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ModelsConfig(pub HashMap<String, ModelSettings>);

impl ModelsConfig {
    pub fn get(&self, name: &str) -> Option<&ModelSettings> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, settings: ModelSettings) {
        self.0.insert(name.into(), settings);
    }
}

/// Settings of the shared conversation
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Registered model name the conversation talks to
    pub model: String,
    /// Credential override; falls back to the model's own credential
    #[serde(default)]
    pub api_key: Option<String>,
    /// Reported total-token usage at which history gets truncated
    pub max_tokens: u32,
    /// Share of the oldest messages removed on truncation, in percent
    pub cut_percentage: f64,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_log_dir() -> String {
    "log".to_string()
}

impl ConversationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.cut_percentage) {
            return Err(format!(
                "cut_percentage must be within [0, 100], got {}",
                self.cut_percentage
            ));
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be positive".to_string());
        }
        Ok(())
    }
}
