use crate::blocking::block_on;
use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::prompt::{build_prompt, PromptExample};
use async_trait::async_trait;

/// Anything that can turn a single prompt into a completion.
///
/// Failures are never returned as `Err`: they come back as a failed
/// [`CompletionResult`] carrying the classified error.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, message: &str, params: &GenerationParams) -> CompletionResult;

    /// Build a zero/one/few-shot prompt and send it
    async fn send_prompt(
        &self,
        instruction: &str,
        expectation: &str,
        request: &str,
        examples: &[PromptExample],
        params: &GenerationParams,
    ) -> CompletionResult {
        let prompt = build_prompt(instruction, expectation, request, examples);
        self.send_message(&prompt, params).await
    }

    fn send_message_blocking(&self, message: &str, params: &GenerationParams) -> CompletionResult {
        block_on(self.send_message(message, params)).unwrap_or_else(blocking_failure)
    }

    fn send_prompt_blocking(
        &self,
        instruction: &str,
        expectation: &str,
        request: &str,
        examples: &[PromptExample],
        params: &GenerationParams,
    ) -> CompletionResult {
        block_on(self.send_prompt(instruction, expectation, request, examples, params))
            .unwrap_or_else(blocking_failure)
    }
}

pub(crate) fn blocking_failure(error: std::io::Error) -> CompletionResult {
    CompletionResult::failure(CompletionFailure::Dispatch(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedSender;

    #[tokio::test]
    async fn test_send_prompt_sends_built_prompt() {
        let sender = ScriptedSender::echo();
        let result = sender
            .send_prompt(
                "Summarize this review",
                "Sentiment",
                "Not so good",
                &[PromptExample::new("I love it", "positive")],
                &GenerationParams::default(),
            )
            .await;

        assert!(result.is_success());
        assert_eq!(
            sender.calls(),
            vec!["Summarize this review:\nI love it\nSentiment:\npositive\n\n\
                  Summarize this review:\nNot so good\nSentiment:"
                .to_string()]
        );
    }

    #[test]
    fn test_blocking_send_outside_runtime() {
        let sender = ScriptedSender::new(|_| Ok("4".to_string()));
        let result = sender.send_prompt_blocking("Add", "Sum", "2 + 2", &[], &GenerationParams::default());
        assert_eq!(result.completion(), "4");
        assert_eq!(sender.calls(), vec!["Add:\n2 + 2\nSum:".to_string()]);
    }
}
