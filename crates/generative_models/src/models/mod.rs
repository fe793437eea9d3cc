//! Concrete generative models
//!
//! Every model is a [`MessageSender`] that also knows its settings, tokenizer and
//! capabilities. Two families exist: chat models talking to the chat-completions
//! endpoint and text models talking to the legacy completions endpoint.

mod chat;
mod text;

pub use chat::ChatModel;
pub use text::TextModel;

use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::overlap::{OverlapOptions, OverlapReducer, DEFAULT_COMPRESSING_INSTRUCTION};
use crate::sender::{blocking_failure, MessageSender};
use crate::tokenizer::{TiktokenTokenizer, Tokenizer, TokenizerError};
use async_trait::async_trait;
use config::{ConfigError, ModelSettings};
use inference_providers::{
    ChatMessage, CompletionError, ExternalProvider, ExternalProviderConfig, FunctionDefinition,
    InferenceProvider, ProviderConfig, TokenUsage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a model can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Structured multi-turn dialogue
    pub chat: bool,
    /// Single text prompt
    pub text: bool,
    /// Function declarations alongside a dialogue
    pub functions: bool,
}

#[async_trait]
pub trait GenerativeModel: MessageSender {
    /// Registered model name, e.g. "GPT 3.5"
    fn name(&self) -> &str;

    /// Model settings without the credential
    fn settings(&self) -> &ModelSettings;

    fn tokenizer(&self) -> Arc<dyn Tokenizer>;

    fn capabilities(&self) -> ModelCapabilities;

    /// Instruction used to compress oversized content when the caller gives none
    fn content_compressing_instruction(&self) -> &str {
        DEFAULT_COMPRESSING_INSTRUCTION
    }

    /// Send a structured dialogue, optionally declaring callable functions
    async fn send_chat_message(
        &self,
        _dialogue: &[ChatMessage],
        _params: &GenerationParams,
        _functions: Option<&[FunctionDefinition]>,
    ) -> CompletionResult {
        CompletionResult::failure(CompletionFailure::Unsupported(format!(
            "{} doesn't support chat dialogues",
            self.name()
        )))
    }
}

/// Overlap compression on a shared model handle
#[async_trait]
pub trait OverlapExt {
    /// Send content that may exceed the context window. Oversized content is
    /// compressed chunk by chunk first.
    async fn send_content_with_overlap(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult;

    fn send_content_with_overlap_blocking(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult;
}

/// Reducer driven by the model's own settings, tokenizer and compressing instruction
pub fn overlap_reducer<M>(model: &Arc<M>) -> OverlapReducer<M>
where
    M: GenerativeModel + ?Sized + 'static,
{
    let settings = model.settings();
    OverlapReducer::new(
        Arc::clone(model),
        model.tokenizer(),
        settings.context_window as usize,
        settings.request_pause_duration(),
    )
    .with_compressing_instruction(model.content_compressing_instruction())
}

#[async_trait]
impl<M> OverlapExt for Arc<M>
where
    M: GenerativeModel + ?Sized + 'static,
{
    async fn send_content_with_overlap(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult {
        overlap_reducer(self).reduce(content, options, params).await
    }

    fn send_content_with_overlap_blocking(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult {
        crate::blocking::block_on(self.send_content_with_overlap(content, options, params))
            .unwrap_or_else(blocking_failure)
    }
}

/// Transport and tokenizer of a model, built from its validated settings
struct ModelParts {
    settings: ModelSettings,
    public_settings: ModelSettings,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ModelParts {
    fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        settings
            .validate()
            .map_err(|reason| ConfigError::InvalidModelSettings {
                model: settings.model.clone(),
                reason,
            })?;
        let tokenizer = Arc::new(TiktokenTokenizer::for_model(&settings.model)?);
        Ok(Self {
            public_settings: settings.redacted(),
            settings,
            tokenizer,
        })
    }

    fn default_provider(settings: &ModelSettings) -> Arc<dyn InferenceProvider> {
        Arc::new(ExternalProvider::new(ExternalProviderConfig {
            model_name: settings.model.clone(),
            provider_config: ProviderConfig::OpenAiCompatible {
                base_url: settings.base_url.clone(),
                organization_id: None,
            },
            api_key: settings.api_key.clone().unwrap_or_default(),
            timeout_seconds: settings.timeout_seconds,
        }))
    }

    /// Validate per-call parameters and fill the gaps from the configured defaults
    fn resolve(&self, params: &GenerationParams) -> Result<GenerationParams, CompletionFailure> {
        params.validate()?;
        Ok(params.resolve(&self.settings))
    }
}

fn total_tokens(usage: Option<&TokenUsage>) -> Option<u32> {
    usage.map(|usage| usage.total_tokens)
}

fn transport_failure(model: &str, error: CompletionError) -> CompletionResult {
    tracing::warn!(model = %model, error = %error, "Completion request failed");
    CompletionResult::failure(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_providers::mock::{RecordedRequest, RequestMatcher, ResponseTemplate};
    use inference_providers::MockProvider;

    #[tokio::test]
    async fn test_overlap_on_model_handle_uses_model_settings() {
        let provider = Arc::new(MockProvider::new());
        provider
            .when(RequestMatcher::PromptContains("Briefly retell".to_string()))
            .respond_with(ResponseTemplate::new("short"))
            .await;
        provider
            .set_default_response(ResponseTemplate::new("final answer"))
            .await;

        let settings = ModelSettings::new("gpt-3.5-turbo", 40, 0.0);
        let model: Arc<dyn GenerativeModel> =
            Arc::new(ChatModel::with_provider("GPT 3.5", settings, provider.clone()).unwrap());

        let content = "The quick brown fox jumps over the lazy dog. ".repeat(12);
        let result = model
            .send_content_with_overlap(
                &content,
                &OverlapOptions::new().with_final_instruction("Summarize:"),
                &GenerationParams::default(),
            )
            .await;

        assert_eq!(result.completion(), "final answer");
        let requests = provider.requests().await;
        assert!(requests.len() > 2);
        let last = requests.last().unwrap();
        assert!(last.prompt().starts_with("Summarize:\nshort\n"));
        assert!(requests[..requests.len() - 1]
            .iter()
            .all(|r| r.prompt().starts_with(DEFAULT_COMPRESSING_INSTRUCTION)));
        assert!(matches!(last, RecordedRequest::Chat(_)));
    }

    #[test]
    fn test_model_parts_reject_invalid_settings() {
        let err = ModelParts::new(ModelSettings::new("gpt-3.5-turbo", 0, 0.0))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ModelError::Config(ConfigError::InvalidModelSettings { .. })
        ));

        let err = ModelParts::new(ModelSettings::new("no-such-model", 10, 0.0))
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Tokenizer(_)));
    }
}
