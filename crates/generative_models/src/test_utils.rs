//! Deterministic doubles shared by the unit tests of this crate

use crate::completion::{CompletionFailure, CompletionResult, GenerationParams};
use crate::sender::MessageSender;
use crate::tokenizer::{Token, Tokenizer, TokenizerError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One token per character, the token being the code point
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        text.chars().map(|c| c as Token).collect()
    }

    fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError> {
        tokens
            .iter()
            .map(|&t| {
                char::from_u32(t).ok_or_else(|| TokenizerError::Decode(format!("invalid code point {t}")))
            })
            .collect()
    }
}

type Reply = Box<dyn Fn(&str) -> Result<String, CompletionFailure> + Send + Sync>;
type Delay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// Sender answering from a script and recording every prompt it receives
pub struct ScriptedSender {
    reply: Reply,
    delay: Delay,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSender {
    pub fn new(reply: impl Fn(&str) -> Result<String, CompletionFailure> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            delay: Box::new(|_| Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn echo() -> Self {
        Self::new(|prompt| Ok(prompt.to_string()))
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    async fn send_message(&self, message: &str, _params: &GenerationParams) -> CompletionResult {
        self.calls
            .lock()
            .unwrap()
            .push((message.to_string(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(message);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = (self.reply)(message);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result.into()
    }
}
