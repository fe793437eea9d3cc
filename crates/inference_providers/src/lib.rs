//! Inference providers crate for talking to hosted completion APIs
//!
//! This crate provides a small trait interface over remote model backends so the
//! orchestration layer never deals with HTTP directly. Every call is a single
//! request/response exchange; failures come back as a classified [`CompletionError`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use inference_providers::{ChatCompletionParams, ChatMessage, InferenceProvider};
//!
//! async fn example<P: InferenceProvider>(provider: P) {
//!     let params = ChatCompletionParams::new("gpt-3.5-turbo", vec![ChatMessage::user("Hello")]);
//!     match provider.chat_completion(params).await {
//!         Ok(response) => println!("{:?}", response.choices[0].message.content),
//!         Err(e) => eprintln!("Completion failed: {e}"),
//!     }
//! }
//! ```

pub mod external;
pub mod mock;
pub mod models;

use async_trait::async_trait;

// Re-export commonly used types for convenience
pub use mock::MockProvider;
pub use models::{
    ChatCompletionParams, ChatCompletionResponse, ChatCompletionResponseChoice, ChatMessage,
    ChatResponseMessage, CompletionError, CompletionParams, CompletionResponse,
    FunctionDefinition, MessageRole, TextChoice, TokenUsage, ToolDefinition,
};

// External provider exports
pub use external::{ExternalProvider, ExternalProviderConfig, OpenAiCompatibleBackend, ProviderConfig};

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Performs a chat completion request
    ///
    /// Sends the whole dialogue and returns the provider's complete response.
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError>;

    /// Performs a text completion request
    ///
    /// Similar to chat completion but for raw text prompts rather than conversations.
    async fn text_completion(
        &self,
        params: CompletionParams,
    ) -> Result<CompletionResponse, CompletionError>;
}

/// Pull the human readable message out of a provider error body.
///
/// OpenAI-compatible APIs answer with `{"error": {"message": "..."}}`; anything else
/// is returned trimmed as-is.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_openai_error_message() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":null}}"#;
        assert_eq!(extract_error_message(body), "Rate limit reached");
    }

    #[test]
    fn test_extract_plain_error_message() {
        assert_eq!(extract_error_message("  Bad Gateway \n"), "Bad Gateway");
    }
}
