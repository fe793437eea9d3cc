use super::{total_tokens, transport_failure, GenerativeModel, ModelCapabilities, ModelError, ModelParts};
use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::sender::MessageSender;
use crate::tokenizer::Tokenizer;
use async_trait::async_trait;
use config::ModelSettings;
use inference_providers::{CompletionParams, InferenceProvider};
use std::sync::Arc;
use tracing::debug;

/// Model served by the legacy text-completions endpoint. Single prompts only.
pub struct TextModel {
    name: String,
    parts: ModelParts,
    provider: Arc<dyn InferenceProvider>,
}

impl TextModel {
    pub const DEFAULT_NAME: &'static str = "GPT 2";

    pub fn new(name: impl Into<String>, settings: ModelSettings) -> Result<Self, ModelError> {
        let provider = ModelParts::default_provider(&settings);
        Self::with_provider(name, settings, provider)
    }

    pub fn with_provider(
        name: impl Into<String>,
        settings: ModelSettings,
        provider: Arc<dyn InferenceProvider>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            name: name.into(),
            parts: ModelParts::new(settings)?,
            provider,
        })
    }
}

#[async_trait]
impl MessageSender for TextModel {
    async fn send_message(&self, message: &str, params: &GenerationParams) -> CompletionResult {
        let params = match self.parts.resolve(params) {
            Ok(params) => params,
            Err(failure) => return CompletionResult::failure(failure),
        };

        let mut request = CompletionParams::new(self.parts.settings.model.clone(), message);
        request.max_tokens = params.max_tokens;
        request.top_p = params.top_p;
        request.temperature = params.temperature;
        request.api_key = params.api_key;

        debug!(model = %self.name, prompt_len = message.len(), "Sending text completion");
        match self.provider.text_completion(request).await {
            Ok(response) => {
                let completion = match response.choices.first() {
                    Some(choice) if !choice.text.is_empty() => Ok(choice.text.clone()),
                    Some(_) => Err(CompletionFailure::Transport(
                        "response has no content".to_string(),
                    )),
                    None => Err(CompletionFailure::Transport(
                        "response has no choices".to_string(),
                    )),
                };
                CompletionResult::from(completion)
                    .with_total_tokens(total_tokens(response.usage.as_ref()))
            }
            Err(error) => transport_failure(&self.name, error),
        }
    }
}

impl GenerativeModel for TextModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ModelSettings {
        &self.parts.public_settings
    }

    fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        self.parts.tokenizer.clone()
    }

    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            chat: false,
            text: true,
            functions: false,
        }
    }
}
