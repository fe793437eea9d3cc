//! Overlap chunking and the compress-and-reduce loop
//!
//! Content that doesn't fit a model's context window is cut into overlapping token
//! windows. Every window is compressed by the model, the compressed parts are glued
//! back together in window order, and the loop repeats until the text fits. A pass
//! that doesn't shrink the text stops the reduction.

use crate::blocking::block_on;
use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::sender::{blocking_failure, MessageSender};
use crate::tokenizer::{Token, Tokenizer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_COMPRESSING_INSTRUCTION: &str =
    "Briefly retell the text below retaining all the information:";

pub const DEFAULT_OVERLAP_PERCENT: u32 = 10;

/// One slice of an oversized token sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenWindow<'a> {
    /// Position among the windows of one pass
    pub index: usize,
    /// Offset of the first token in the full sequence
    pub start: usize,
    pub tokens: &'a [Token],
}

impl TokenWindow<'_> {
    /// Offset one past the last token
    pub fn end(&self) -> usize {
        self.start + self.tokens.len()
    }
}

/// Cut `tokens` into windows of `window_size` tokens, each starting `overlap_tokens`
/// before the end of its predecessor. The last window may be shorter. No window is
/// produced once one reaches the end of the input.
pub fn split_with_overlap(
    tokens: &[Token],
    window_size: usize,
    overlap_tokens: usize,
) -> Result<Vec<TokenWindow<'_>>, CompletionFailure> {
    if window_size <= overlap_tokens {
        return Err(CompletionFailure::Sizing(format!(
            "window of {window_size} tokens can't hold an overlap of {overlap_tokens} tokens"
        )));
    }

    let step = window_size - overlap_tokens;
    let mut windows = Vec::with_capacity(tokens.len() / step + 1);
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + window_size).min(tokens.len());
        windows.push(TokenWindow {
            index: windows.len(),
            start,
            tokens: &tokens[start..end],
        });
        if end == tokens.len() {
            break;
        }
        start += step;
    }
    Ok(windows)
}

/// Options of a single reduction
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapOptions {
    /// Instruction prefixed to each window; the model's own when unset
    pub compressing_instruction: Option<String>,
    /// Overlap between neighbouring windows, in percent of the context window
    pub overlap_percent: u32,
    /// Instruction prefixed to the fully reduced content
    pub final_instruction: String,
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self {
            compressing_instruction: None,
            overlap_percent: DEFAULT_OVERLAP_PERCENT,
            final_instruction: String::new(),
        }
    }
}

impl OverlapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compressing_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.compressing_instruction = Some(instruction.into());
        self
    }

    pub fn with_overlap_percent(mut self, overlap_percent: u32) -> Self {
        self.overlap_percent = overlap_percent;
        self
    }

    pub fn with_final_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.final_instruction = instruction.into();
        self
    }
}

/// Compress-and-reduce driver over any [`MessageSender`]
pub struct OverlapReducer<S: ?Sized> {
    sender: Arc<S>,
    tokenizer: Arc<dyn Tokenizer>,
    context_window: usize,
    request_pause: Duration,
    compressing_instruction: String,
}

impl<S> OverlapReducer<S>
where
    S: MessageSender + ?Sized + 'static,
{
    pub fn new(
        sender: Arc<S>,
        tokenizer: Arc<dyn Tokenizer>,
        context_window: usize,
        request_pause: Duration,
    ) -> Self {
        Self {
            sender,
            tokenizer,
            context_window,
            request_pause,
            compressing_instruction: DEFAULT_COMPRESSING_INSTRUCTION.to_string(),
        }
    }

    /// Compressing instruction used when the options don't carry one
    pub fn with_compressing_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.compressing_instruction = instruction.into();
        self
    }

    /// Reduce `content` until it fits the context window together with the final
    /// instruction, then send the final request. Its result is the overall result.
    pub async fn reduce(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult {
        match self.reduce_content(content, options, params).await {
            Ok(final_prompt) => {
                debug!(prompt_len = final_prompt.len(), "Sending final request");
                self.sender.send_message(&final_prompt, params).await
            }
            Err(failure) => CompletionResult::failure(failure),
        }
    }

    /// Synchronous [`reduce`](Self::reduce)
    pub fn reduce_blocking(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> CompletionResult {
        block_on(self.reduce(content, options, params)).unwrap_or_else(blocking_failure)
    }

    /// Run the passes and return the final prompt
    async fn reduce_content(
        &self,
        content: &str,
        options: &OverlapOptions,
        params: &GenerationParams,
    ) -> Result<String, CompletionFailure> {
        let context_window = self.context_window;
        let compressing_instruction = options
            .compressing_instruction
            .as_deref()
            .unwrap_or(&self.compressing_instruction);
        let compressing_len = self.tokenizer.count(compressing_instruction);
        let final_len = self.tokenizer.count(&options.final_instruction);

        let mut content = content.to_string();
        let mut tokens = self.tokenizer.encode(&content);

        if tokens.len() > context_window && compressing_len >= context_window {
            return Err(CompletionFailure::Sizing(format!(
                "compressing instruction of {compressing_len} tokens doesn't fit the context window \
                 of {context_window} tokens"
            )));
        }
        if final_len >= context_window {
            return Err(CompletionFailure::Sizing(format!(
                "final instruction of {final_len} tokens doesn't fit the context window of \
                 {context_window} tokens"
            )));
        }

        let budget = context_window - final_len;
        if tokens.len() <= budget {
            return Ok(format!("{}\n{content}", options.final_instruction));
        }

        let (window_size, overlap_tokens) =
            self.window_sizing(compressing_len, options.overlap_percent)?;

        let mut pass = 0;
        while tokens.len() > budget {
            pass += 1;
            let initial_tokens = tokens.len();
            let windows = split_with_overlap(&tokens, window_size, overlap_tokens)?;
            info!(
                pass,
                tokens = initial_tokens,
                windows = windows.len(),
                "Compressing content"
            );

            let prompts = windows
                .iter()
                .map(|window| {
                    self.tokenizer
                        .decode(window.tokens)
                        .map(|text| format!("{compressing_instruction}\n{text}"))
                        .map_err(|e| CompletionFailure::Tokenizer(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let completions = self.dispatch(prompts, params).await?;
            content = completions.iter().map(|c| format!("{c}\n")).collect();
            tokens = self.tokenizer.encode(&content);

            if tokens.len() >= initial_tokens {
                warn!(
                    pass,
                    initial_tokens,
                    produced_tokens = tokens.len(),
                    "Compression pass didn't shrink the content"
                );
                return Err(CompletionFailure::Convergence {
                    initial_tokens,
                    produced_tokens: tokens.len(),
                });
            }
        }

        Ok(format!("{}\n{content}", options.final_instruction))
    }

    fn window_sizing(
        &self,
        compressing_len: usize,
        overlap_percent: u32,
    ) -> Result<(usize, usize), CompletionFailure> {
        if overlap_percent >= 100 {
            return Err(CompletionFailure::Sizing(format!(
                "overlap of {overlap_percent}% must be below 100%"
            )));
        }
        let window_size = self
            .context_window
            .checked_sub(compressing_len)
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                CompletionFailure::Sizing(format!(
                    "compressing instruction of {compressing_len} tokens leaves no room for content \
                     in the context window of {} tokens",
                    self.context_window
                ))
            })?;
        let overlap_tokens = self.context_window * overlap_percent as usize / 100;
        if window_size <= overlap_tokens {
            return Err(CompletionFailure::Sizing(format!(
                "window of {window_size} tokens can't hold an overlap of {overlap_tokens} tokens"
            )));
        }
        Ok((window_size, overlap_tokens))
    }

    /// Submit one request per prompt in order, pausing between submissions, and
    /// collect the completions in the same order. The first failure in window order
    /// wins; requests already in flight are left to finish on their own.
    async fn dispatch(
        &self,
        prompts: Vec<String>,
        params: &GenerationParams,
    ) -> Result<Vec<String>, CompletionFailure> {
        let count = prompts.len();
        let mut handles = Vec::with_capacity(count);
        for (index, prompt) in prompts.into_iter().enumerate() {
            let sender = Arc::clone(&self.sender);
            let params = params.clone();
            handles.push(tokio::spawn(async move {
                sender.send_message(&prompt, &params).await
            }));
            if !self.request_pause.is_zero() && index + 1 < count {
                tokio::time::sleep(self.request_pause).await;
            }
        }

        let mut completions = Vec::with_capacity(count);
        for (index, handle) in handles.into_iter().enumerate() {
            let result = handle
                .await
                .map_err(|e| CompletionFailure::Dispatch(e.to_string()))?;
            match result.into_result() {
                Ok(completion) => completions.push(completion),
                Err(failure) => {
                    warn!(window = index, error = %failure, "Chunk request failed");
                    return Err(failure);
                }
            }
        }
        Ok(completions)
    }
}
