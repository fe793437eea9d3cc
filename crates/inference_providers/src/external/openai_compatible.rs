//! OpenAI-compatible backend implementation
//!
//! This backend handles providers that use OpenAI's API format, including:
//! - OpenAI (api.openai.com)
//! - Azure OpenAI
//! - Any other OpenAI-compatible provider
//!
//! Both the chat endpoint (`/chat/completions`) and the legacy text endpoint
//! (`/completions`) are supported.

use super::backend::{BackendConfig, ExternalBackend};
use crate::{
    extract_error_message, ChatCompletionParams, ChatCompletionResponse, CompletionError,
    CompletionParams, CompletionResponse,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use serde::{de::DeserializeOwned, Serialize};

/// OpenAI-compatible backend
pub struct OpenAiCompatibleBackend {
    client: Client,
}

impl OpenAiCompatibleBackend {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    fn build_headers(&self, config: &BackendConfig) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        // Authorization header
        let auth_value = format!("Bearer {}", config.api_key);
        let header_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| format!("Invalid API key format: {e}"))?;
        headers.insert("Authorization", header_value);

        // OpenAI organization header (if provided)
        if let Some(org_id) = config.extra.get("organization_id") {
            if let Ok(value) = HeaderValue::from_str(org_id) {
                headers.insert("OpenAI-Organization", value);
            }
        }

        Ok(headers)
    }

    /// POST a JSON body and parse the JSON answer, classifying every failure
    async fn post_json<B, R>(
        &self,
        config: &BackendConfig,
        path: &str,
        body: &B,
    ) -> Result<R, CompletionError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", config.base_url.trim_end_matches('/'), path);

        let headers = self
            .build_headers(config)
            .map_err(CompletionError::CompletionError)?;

        let timeout = std::time::Duration::from_secs(config.timeout_seconds.max(1) as u64);

        tracing::debug!(url = %url, "Dispatching completion request");

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| CompletionError::CompletionError(e.to_string()))?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            return Err(CompletionError::HttpError {
                status_code,
                message: extract_error_message(&error_text),
            });
        }

        let raw_bytes = response
            .bytes()
            .await
            .map_err(|e| CompletionError::CompletionError(e.to_string()))?;

        serde_json::from_slice(&raw_bytes)
            .map_err(|e| CompletionError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

impl Default for OpenAiCompatibleBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalBackend for OpenAiCompatibleBackend {
    fn backend_type(&self) -> &'static str {
        "openai_compatible"
    }

    async fn chat_completion(
        &self,
        config: &BackendConfig,
        model: &str,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let mut params = params;
        params.model = model.to_string();
        self.post_json(config, "chat/completions", &params).await
    }

    async fn text_completion(
        &self,
        config: &BackendConfig,
        model: &str,
        params: CompletionParams,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut params = params;
        params.model = model.to_string();
        self.post_json(config, "completions", &params).await
    }
}
