//! Mock implementation of InferenceProvider for testing
//!
//! This module provides a mock provider that generates scripted responses
//! without requiring network access. Every request is recorded so tests can
//! assert on what was dispatched and in which order.

use crate::{
    ChatCompletionParams, ChatCompletionResponse, ChatCompletionResponseChoice, ChatMessage,
    ChatResponseMessage, CompletionError, CompletionParams, CompletionResponse,
    InferenceProvider, MessageRole, TextChoice, TokenUsage,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Request matcher for conditional responses
#[derive(Clone, Debug)]
pub enum RequestMatcher {
    /// Match any request
    Any,
    /// Match requests whose prompt text contains the given fragment
    PromptContains(String),
}

impl RequestMatcher {
    /// Check if this matcher matches the given prompt text
    pub fn matches(&self, prompt: &str) -> bool {
        match self {
            Self::Any => true,
            Self::PromptContains(fragment) => prompt.contains(fragment.as_str()),
        }
    }
}

#[derive(Clone)]
enum ResponseBody {
    Content(String),
    /// Reply with the prompt itself
    Echo,
    /// Reply with whatever `transform` makes of the prompt
    Transform(Arc<dyn Fn(&str) -> String + Send + Sync>),
    FunctionCall { name: String, arguments: String },
    ToolCall { name: String, arguments: String },
    Error(CompletionError),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(content) => f.debug_tuple("Content").field(content).finish(),
            Self::Echo => f.write_str("Echo"),
            Self::Transform(_) => f.write_str("Transform(..)"),
            Self::FunctionCall { name, arguments } => f
                .debug_struct("FunctionCall")
                .field("name", name)
                .field("arguments", arguments)
                .finish(),
            Self::ToolCall { name, arguments } => f
                .debug_struct("ToolCall")
                .field("name", name)
                .field("arguments", arguments)
                .finish(),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

/// Template for generating responses
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    body: ResponseBody,
    delay: Option<Duration>,
    total_tokens: Option<u32>,
}

impl ResponseTemplate {
    /// Create a new response template with the given content
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_body(ResponseBody::Content(content.into()))
    }

    /// Respond with the prompt that was sent
    pub fn echo() -> Self {
        Self::with_body(ResponseBody::Echo)
    }

    /// Respond with a value computed from the prompt that was sent
    pub fn transform(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::with_body(ResponseBody::Transform(Arc::new(f)))
    }

    /// Respond with a legacy function call instead of text content
    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::with_body(ResponseBody::FunctionCall {
            name: name.into(),
            arguments: arguments.into(),
        })
    }

    /// Respond with a single entry in `tool_calls` and no text content, the way
    /// chat endpoints answer a request that declared tools
    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::with_body(ResponseBody::ToolCall {
            name: name.into(),
            arguments: arguments.into(),
        })
    }

    /// Fail the request with the given error
    pub fn error(error: CompletionError) -> Self {
        Self::with_body(ResponseBody::Error(error))
    }

    fn with_body(body: ResponseBody) -> Self {
        Self {
            body,
            delay: None,
            total_tokens: None,
        }
    }

    /// Hold the response back for the given duration
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report this total token usage instead of the word-count estimate
    pub fn with_total_tokens(mut self, total_tokens: u32) -> Self {
        self.total_tokens = Some(total_tokens);
        self
    }

    fn render(&self, prompt: &str) -> Result<RenderedResponse, CompletionError> {
        let (content, function_call, tool_calls) = match &self.body {
            ResponseBody::Content(content) => (Some(content.clone()), None, None),
            ResponseBody::Echo => (Some(prompt.to_string()), None, None),
            ResponseBody::Transform(f) => (Some(f(prompt)), None, None),
            ResponseBody::FunctionCall { name, arguments } => (
                None,
                Some(serde_json::json!({ "name": name, "arguments": arguments })),
                None,
            ),
            ResponseBody::ToolCall { name, arguments } => (
                None,
                None,
                Some(serde_json::json!([{
                    "id": MockProvider::generate_id("call"),
                    "type": "function",
                    "function": { "name": name, "arguments": arguments },
                }])),
            ),
            ResponseBody::Error(error) => return Err(error.clone()),
        };

        // Calculate token usage as word counts
        let prompt_tokens = prompt.split_whitespace().count() as u32;
        let completion_tokens = content
            .as_deref()
            .map(|c| c.split_whitespace().count() as u32)
            .unwrap_or(0);
        let mut usage = TokenUsage::new(prompt_tokens, completion_tokens);
        if let Some(total_tokens) = self.total_tokens {
            usage.total_tokens = total_tokens;
        }

        Ok(RenderedResponse {
            content,
            function_call,
            tool_calls,
            usage,
        })
    }
}

struct RenderedResponse {
    content: Option<String>,
    function_call: Option<serde_json::Value>,
    tool_calls: Option<serde_json::Value>,
    usage: TokenUsage,
}

/// A request the mock has received
#[derive(Clone, Debug)]
pub enum RecordedRequest {
    Chat(ChatCompletionParams),
    Text(CompletionParams),
}

impl RecordedRequest {
    /// All prompt text of the request; chat message contents are joined with a space
    pub fn prompt(&self) -> String {
        match self {
            Self::Chat(params) => extract_text_from_messages(&params.messages),
            Self::Text(params) => params.prompt.clone(),
        }
    }
}

/// Extract all text content from messages
fn extract_text_from_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|msg| msg.content.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Configuration for a single expectation
struct MockExpectation {
    matcher: RequestMatcher,
    response: ResponseTemplate,
}

/// Configuration for the mock provider
struct MockConfig {
    expectations: Vec<MockExpectation>,
    default_response: ResponseTemplate,
}

/// Builder for configuring a single expectation
pub struct MockExpectationBuilder {
    config: Arc<Mutex<MockConfig>>,
    matcher: RequestMatcher,
}

impl MockExpectationBuilder {
    /// Set the response for this expectation
    pub async fn respond_with(self, response: ResponseTemplate) {
        let mut config = self.config.lock().await;
        config.expectations.push(MockExpectation {
            matcher: self.matcher,
            response,
        });
    }
}

/// Mock provider that implements InferenceProvider for testing
pub struct MockProvider {
    /// Configuration for conditional responses (thread-safe)
    config: Arc<Mutex<MockConfig>>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider answering "1. 2. 3." to everything
    pub fn new() -> Self {
        Self {
            config: Arc::new(Mutex::new(MockConfig {
                expectations: Vec::new(),
                default_response: ResponseTemplate::new("1. 2. 3."),
            })),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a conditional response for a specific matcher
    ///
    /// Expectations are checked in registration order; the first match wins.
    pub fn when(&self, matcher: RequestMatcher) -> MockExpectationBuilder {
        MockExpectationBuilder {
            config: self.config.clone(),
            matcher,
        }
    }

    /// Set the default response for requests that don't match any expectation
    pub async fn set_default_response(&self, response: ResponseTemplate) {
        let mut config = self.config.lock().await;
        config.default_response = response;
    }

    /// All requests received so far
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Generate a completion ID
    fn generate_id(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
    }

    /// Get current timestamp
    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    async fn respond(&self, request: RecordedRequest) -> Result<RenderedResponse, CompletionError> {
        let prompt = request.prompt();
        self.requests.lock().await.push(request);

        let template = {
            let config = self.config.lock().await;
            config
                .expectations
                .iter()
                .find(|expectation| expectation.matcher.matches(&prompt))
                .map(|expectation| expectation.response.clone())
                .unwrap_or_else(|| config.default_response.clone())
        };

        if let Some(delay) = template.delay {
            tokio::time::sleep(delay).await;
        }

        template.render(&prompt)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    async fn chat_completion(
        &self,
        params: ChatCompletionParams,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let model = params.model.clone();
        let rendered = self.respond(RecordedRequest::Chat(params)).await?;
        let finish_reason = if rendered.tool_calls.is_some() {
            "tool_calls"
        } else if rendered.function_call.is_some() {
            "function_call"
        } else {
            "stop"
        };

        Ok(ChatCompletionResponse {
            id: Self::generate_id("chatcmpl"),
            object: "chat.completion".to_string(),
            created: Self::current_timestamp(),
            model,
            choices: vec![ChatCompletionResponseChoice {
                index: 0,
                message: ChatResponseMessage {
                    role: MessageRole::Assistant,
                    content: rendered.content,
                    function_call: rendered.function_call,
                    tool_calls: rendered.tool_calls,
                },
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage: Some(rendered.usage),
        })
    }

    async fn text_completion(
        &self,
        params: CompletionParams,
    ) -> Result<CompletionResponse, CompletionError> {
        let model = params.model.clone();
        let rendered = self.respond(RecordedRequest::Text(params)).await?;

        Ok(CompletionResponse {
            id: Self::generate_id("cmpl"),
            object: "text_completion".to_string(),
            created: Self::current_timestamp(),
            model,
            choices: vec![TextChoice {
                index: 0,
                text: rendered.content.unwrap_or_default(),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(rendered.usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matchers() {
        assert!(RequestMatcher::Any.matches("anything"));
        assert!(RequestMatcher::PromptContains("wor".to_string()).matches("hello world"));
        assert!(!RequestMatcher::PromptContains("moon".to_string()).matches("hello world"));
    }

    #[test]
    fn test_default_response_and_recording() {
        let provider = MockProvider::new();
        let response = tokio_test::block_on(provider.chat_completion(ChatCompletionParams::new(
            "gpt-3.5-turbo",
            vec![ChatMessage::user("Count to three")],
        )))
        .unwrap();

        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("1. 2. 3.")
        );
        let requests = tokio_test::block_on(provider.requests());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt(), "Count to three");
    }

    #[tokio::test]
    async fn test_first_matching_expectation_wins() {
        let provider = MockProvider::new();
        provider
            .when(RequestMatcher::PromptContains("fail".to_string()))
            .respond_with(ResponseTemplate::error(CompletionError::HttpError {
                status_code: 429,
                message: "Rate limit reached".to_string(),
            }))
            .await;
        provider
            .when(RequestMatcher::Any)
            .respond_with(ResponseTemplate::echo().with_total_tokens(42))
            .await;

        let err = provider
            .text_completion(CompletionParams::new("text-davinci-002", "please fail"))
            .await
            .unwrap_err();
        assert!(err.is_provider_reported());

        let ok = provider
            .text_completion(CompletionParams::new("text-davinci-002", "say it back"))
            .await
            .unwrap();
        assert_eq!(ok.choices[0].text, "say it back");
        assert_eq!(ok.usage.unwrap().total_tokens, 42);
        assert_eq!(provider.request_count().await, 2);
    }

    #[tokio::test]
    async fn test_function_call_template() {
        let provider = MockProvider::new();
        provider
            .set_default_response(ResponseTemplate::function_call(
                "get_weather",
                r#"{"location": "Boston"}"#,
            ))
            .await;

        let response = provider
            .chat_completion(ChatCompletionParams::new(
                "gpt-3.5-turbo",
                vec![ChatMessage::user("Weather in Boston?")],
            ))
            .await
            .unwrap();
        let message = &response.choices[0].message;
        assert!(message.content.is_none());
        assert_eq!(message.function_call.as_ref().unwrap()["name"], "get_weather");
        assert_eq!(
            response.choices[0].finish_reason.as_deref(),
            Some("function_call")
        );
    }

    #[tokio::test]
    async fn test_tool_call_template() {
        let provider = MockProvider::new();
        provider
            .set_default_response(ResponseTemplate::tool_call(
                "get_weather",
                r#"{"location": "Boston"}"#,
            ))
            .await;

        let response = provider
            .chat_completion(ChatCompletionParams::new(
                "gpt-3.5-turbo",
                vec![ChatMessage::user("Weather in Boston?")],
            ))
            .await
            .unwrap();
        let message = &response.choices[0].message;
        assert!(message.content.is_none());
        assert!(message.function_call.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0]["type"], "function");
        assert_eq!(calls[0]["function"]["name"], "get_weather");
        assert_eq!(
            response.choices[0].finish_reason.as_deref(),
            Some("tool_calls")
        );
    }
}
