use config::ModelSettings;
use inference_providers::CompletionError;
use serde::{Deserialize, Serialize};

/// Classified reason of a failed completion
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionFailure {
    /// An instruction leaves no room for content in the context window
    #[error("Sizing error: {0}")]
    Sizing(String),

    /// A compression pass did not shrink the content
    #[error(
        "The model generated an intermediate prompt of {produced_tokens} tokens, not shorter than \
         the {initial_tokens} tokens it was given. Inference was stopped to avoid an infinite cycle"
    )]
    Convergence {
        initial_tokens: usize,
        produced_tokens: usize,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Failure reported by the provider (authentication, quota, malformed request)
    #[error("Provider error ({status_code}): {message}")]
    Provider { status_code: u16, message: String },

    /// Network, serialization or any other failure around the remote call
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// A dispatched chunk request never reported back
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl CompletionFailure {
    /// Short classification shown to API consumers
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "Provider error",
            Self::Sizing(_) => "Sizing error",
            Self::Convergence { .. } => "Convergence error",
            _ => "Other error",
        }
    }
}

impl From<CompletionError> for CompletionFailure {
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::HttpError {
                status_code,
                message,
            } => Self::Provider {
                status_code,
                message,
            },
            CompletionError::CompletionError(message) => Self::Transport(message),
            CompletionError::InvalidResponse(message) => {
                Self::Transport(format!("Invalid response format: {message}"))
            }
        }
    }
}

/// Uniform success/failure envelope returned by every model-calling operation.
///
/// A successful result has a completion and no error; a failed one has an error and an
/// empty completion. Fields are private so the pairing can't be broken after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    success: bool,
    completion: String,
    error: Option<CompletionFailure>,
    total_tokens: Option<u32>,
}

impl CompletionResult {
    pub fn success(completion: impl Into<String>) -> Self {
        Self {
            success: true,
            completion: completion.into(),
            error: None,
            total_tokens: None,
        }
    }

    pub fn failure(error: impl Into<CompletionFailure>) -> Self {
        Self {
            success: false,
            completion: String::new(),
            error: Some(error.into()),
            total_tokens: None,
        }
    }

    /// Attach the total token usage the provider reported for this call
    pub fn with_total_tokens(mut self, total_tokens: Option<u32>) -> Self {
        self.total_tokens = total_tokens;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn completion(&self) -> &str {
        &self.completion
    }

    pub fn error(&self) -> Option<&CompletionFailure> {
        self.error.as_ref()
    }

    pub fn total_tokens(&self) -> Option<u32> {
        self.total_tokens
    }

    pub fn into_result(self) -> Result<String, CompletionFailure> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.completion),
        }
    }
}

impl From<Result<String, CompletionFailure>> for CompletionResult {
    fn from(result: Result<String, CompletionFailure>) -> Self {
        match result {
            Ok(completion) => Self::success(completion),
            Err(error) => Self::failure(error),
        }
    }
}

/// Per-call generation parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Limit of tokens within the completion
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling, within [0, 1]
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Sampling temperature, within [0, 2]
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Credential override for this call
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl GenerationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn validate(&self) -> Result<(), CompletionFailure> {
        if self.max_tokens == Some(0) {
            return Err(CompletionFailure::InvalidParams(
                "max_tokens must be positive".to_string(),
            ));
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(CompletionFailure::InvalidParams(format!(
                    "top_p must be within [0, 1], got {top_p}"
                )));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(CompletionFailure::InvalidParams(format!(
                    "temperature must be within [0, 2], got {temperature}"
                )));
            }
        }
        Ok(())
    }

    /// Fill unset values from the model's configured defaults
    pub fn resolve(&self, defaults: &ModelSettings) -> Self {
        Self {
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            temperature: self.temperature.or(defaults.temperature),
            api_key: self.api_key.clone().or_else(|| defaults.api_key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_shapes() {
        let ok = CompletionResult::success("done");
        assert!(ok.is_success());
        assert_eq!(ok.completion(), "done");
        assert!(ok.error().is_none());

        let failed = CompletionResult::failure(CompletionFailure::Transport("timeout".into()));
        assert!(!failed.is_success());
        assert_eq!(failed.completion(), "");
        assert_eq!(failed.error().unwrap().error_type(), "Other error");
    }

    #[test]
    fn test_provider_errors_are_classified() {
        let failure: CompletionFailure = CompletionError::HttpError {
            status_code: 429,
            message: "Rate limit reached".to_string(),
        }
        .into();
        assert_eq!(failure.error_type(), "Provider error");

        let failure: CompletionFailure =
            CompletionError::CompletionError("connection reset".to_string()).into();
        assert_eq!(failure, CompletionFailure::Transport("connection reset".to_string()));
    }

    #[test]
    fn test_params_validation() {
        assert!(GenerationParams::new().with_top_p(0.5).validate().is_ok());
        assert!(GenerationParams::new().with_top_p(1.1).validate().is_err());
        assert!(GenerationParams::new().with_temperature(2.0).validate().is_ok());
        assert!(GenerationParams::new().with_temperature(-0.1).validate().is_err());
        assert!(GenerationParams::new().with_max_tokens(0).validate().is_err());
    }

    #[test]
    fn test_resolve_prefers_call_values() {
        let mut defaults = ModelSettings::new("gpt-3.5-turbo", 4096, 0.0).with_api_key("sk-model");
        defaults.temperature = Some(0.2);
        defaults.max_tokens = Some(256);

        let resolved = GenerationParams::new().with_temperature(1.0).resolve(&defaults);
        assert_eq!(resolved.temperature, Some(1.0));
        assert_eq!(resolved.max_tokens, Some(256));
        assert_eq!(resolved.top_p, None);
        assert_eq!(resolved.api_key.as_deref(), Some("sk-model"));
    }
}
