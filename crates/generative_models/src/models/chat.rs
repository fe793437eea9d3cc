use super::{total_tokens, transport_failure, GenerativeModel, ModelCapabilities, ModelError, ModelParts};
use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::sender::MessageSender;
use crate::tokenizer::Tokenizer;
use async_trait::async_trait;
use config::ModelSettings;
use inference_providers::{
    ChatCompletionParams, ChatCompletionResponse, ChatMessage, FunctionDefinition,
    InferenceProvider,
};
use std::sync::Arc;
use tracing::debug;

/// Model served by the chat-completions endpoint
pub struct ChatModel {
    name: String,
    parts: ModelParts,
    provider: Arc<dyn InferenceProvider>,
}

impl ChatModel {
    /// Name the model is registered under by default
    pub const DEFAULT_NAME: &'static str = "GPT 3.5";

    /// Model talking to the OpenAI-compatible API described by `settings`
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

    fn request(
        &self,
        dialogue: Vec<ChatMessage>,
        params: GenerationParams,
        functions: Option<&[FunctionDefinition]>,
    ) -> ChatCompletionParams {
        let mut request = ChatCompletionParams::new(self.parts.settings.model.clone(), dialogue);
        request.max_tokens = params.max_tokens;
        request.top_p = params.top_p;
        request.temperature = params.temperature;
        request.api_key = params.api_key;
        request.tools = functions
            .filter(|functions| !functions.is_empty())
            .map(|functions| functions.iter().cloned().map(Into::into).collect());
        request
    }

    /// Text content of the first choice, or the function call it asks for.
    ///
    /// A call is rendered as `{"name": ..., "arguments": ...}` whether it came back as the
    /// first entry of `tool_calls` or as the legacy `function_call`.
    fn completion_of(response: &ChatCompletionResponse) -> Result<String, CompletionFailure> {
        let message = response
            .choices
            .first()
            .map(|choice| &choice.message)
            .ok_or_else(|| CompletionFailure::Transport("response has no choices".to_string()))?;

        let tool_function = message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.get(0))
            .and_then(|call| call.get("function"));
        if let Some(function) = tool_function {
            return Ok(function.to_string());
        }
        if let Some(function_call) = &message.function_call {
            return Ok(function_call.to_string());
        }
        match message.content.as_deref() {
            Some(content) if !content.is_empty() => Ok(content.to_string()),
            _ => Err(CompletionFailure::Transport(
                "response has no content".to_string(),
            )),
        }
    }
}

#[async_trait]
impl MessageSender for ChatModel {
    async fn send_message(&self, message: &str, params: &GenerationParams) -> CompletionResult {
        self.send_chat_message(&[ChatMessage::user(message)], params, None)
            .await
    }
}

#[async_trait]
impl GenerativeModel for ChatModel {
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
            chat: true,
            text: true,
            functions: true,
        }
    }

    async fn send_chat_message(
        &self,
        dialogue: &[ChatMessage],
        params: &GenerationParams,
        functions: Option<&[FunctionDefinition]>,
    ) -> CompletionResult {
        let params = match self.parts.resolve(params) {
            Ok(params) => params,
            Err(failure) => return CompletionResult::failure(failure),
        };

        debug!(
            model = %self.name,
            messages = dialogue.len(),
            functions = functions.map_or(0, <[_]>::len),
            "Sending chat completion"
        );
        let request = self.request(dialogue.to_vec(), params, functions);
        match self.provider.chat_completion(request).await {
            Ok(response) => CompletionResult::from(Self::completion_of(&response))
                .with_total_tokens(total_tokens(response.usage.as_ref())),
            Err(error) => transport_failure(&self.name, error),
        }
    }
}
