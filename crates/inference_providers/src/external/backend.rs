//! Backend trait for external provider implementations
//!
//! This module defines the internal abstraction for different external AI providers.
//! Each backend handles the API-specific translation between our internal format
//! and the provider's native format.

use crate::{
    ChatCompletionParams, ChatCompletionResponse, CompletionError, CompletionParams,
    CompletionResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Configuration for a backend connection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for the provider API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: i64,
    /// Provider-specific extra configuration (e.g., organization_id)
    pub extra: HashMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_seconds: 120,
            extra: HashMap::new(),
        }
    }
}

/// Internal backend trait for different API formats
#[async_trait]
pub trait ExternalBackend: Send + Sync {
    /// Returns the backend type identifier (e.g., "openai_compatible")
    fn backend_type(&self) -> &'static str;

    /// Performs a chat completion request
    ///
    /// The backend is responsible for:
    /// - Translating ChatCompletionParams to provider-specific format
    /// - Making the HTTP request
    /// - Parsing the response and translating it back to our ChatCompletionResponse format
    async fn chat_completion(
        &self,
        config: &BackendConfig,
        model: &str,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError>;

    /// Performs a legacy text completion request
    ///
    /// Default implementation returns an error indicating the endpoint is not supported.
    async fn text_completion(
        &self,
        _config: &BackendConfig,
        _model: &str,
        _params: CompletionParams,
    ) -> Result<CompletionResponse, CompletionError> {
        Err(CompletionError::CompletionError(format!(
            "Text completion is not supported by the {} backend.",
            self.backend_type()
        )))
    }
}
