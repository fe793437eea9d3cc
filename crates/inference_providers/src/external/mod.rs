//! External provider module for hosted AI providers
//!
//! This module provides a unified `ExternalProvider` that hides the concrete
//! API format behind a single implementation of the `InferenceProvider` trait.
//!
//! # Architecture
//!
//! ```text
//! ExternalProvider (implements InferenceProvider)
//!     └── backends:
//!         └── OpenAiCompatibleBackend (OpenAI, Azure, etc.)
//! ```
//!
//! # Adding New Providers
//!
//! Add a new backend file implementing `ExternalBackend` and a matching
//! `ProviderConfig` variant.

pub mod backend;
pub mod openai_compatible;

use crate::{
    ChatCompletionParams, ChatCompletionResponse, CompletionError, CompletionParams,
    CompletionResponse, InferenceProvider,
};
use async_trait::async_trait;
use backend::{BackendConfig, ExternalBackend};
use serde::Deserialize;
use std::sync::Arc;

pub use backend::BackendConfig as ExternalBackendConfig;
pub use openai_compatible::OpenAiCompatibleBackend;

/// Provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend")]
pub enum ProviderConfig {
    /// OpenAI-compatible providers
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        /// Base URL for the API (e.g., "https://api.openai.com/v1")
        base_url: String,
        /// Optional organization ID for OpenAI
        #[serde(default)]
        organization_id: Option<String>,
    },
}

/// Configuration for an external provider
#[derive(Debug, Clone)]
pub struct ExternalProviderConfig {
    /// Provider-side model identifier
    pub model_name: String,
    pub provider_config: ProviderConfig,
    /// API key for authentication
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: i64,
}

/// External provider facade
///
/// Implements `InferenceProvider` by delegating to the appropriate backend
/// based on the provider configuration.
pub struct ExternalProvider {
    backend: Arc<dyn ExternalBackend>,
    config: BackendConfig,
    model_name: String,
}

impl ExternalProvider {
    /// Create a new external provider with the given configuration
    pub fn new(external_config: ExternalProviderConfig) -> Self {
        let ExternalProviderConfig {
            model_name,
            provider_config,
            api_key,
            timeout_seconds,
        } = external_config;

        let (backend, config): (Arc<dyn ExternalBackend>, BackendConfig) = match provider_config {
            ProviderConfig::OpenAiCompatible {
                base_url,
                organization_id,
            } => {
                let mut extra = std::collections::HashMap::new();
                if let Some(org_id) = organization_id {
                    extra.insert("organization_id".to_string(), org_id);
                }

                (
                    Arc::new(OpenAiCompatibleBackend::new()),
                    BackendConfig {
                        base_url,
                        api_key,
                        timeout_seconds,
                        extra,
                    },
                )
            }
        };

        Self {
            backend,
            config,
            model_name,
        }
    }

    /// Backend configuration for one request, honouring a per-request credential
    fn config_for(&self, api_key: Option<String>) -> std::borrow::Cow<'_, BackendConfig> {
        match api_key {
            Some(api_key) => std::borrow::Cow::Owned(BackendConfig {
                api_key,
                ..self.config.clone()
            }),
            None => std::borrow::Cow::Borrowed(&self.config),
        }
    }

    /// Get the backend type identifier
    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl InferenceProvider for ExternalProvider {
    async fn chat_completion(
        &self,
        mut params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let config = self.config_for(params.api_key.take());
        self.backend
            .chat_completion(&config, &self.model_name, params)
            .await
    }

    async fn text_completion(
        &self,
        mut params: CompletionParams,
    ) -> Result<CompletionResponse, CompletionError> {
        let config = self.config_for(params.api_key.take());
        self.backend
            .text_completion(&config, &self.model_name, params)
            .await
    }
}
