//! Orchestration of generative model calls
//!
//! Models are looked up by name in a [`ModelRegistry`] and used through the
//! [`MessageSender`] / [`GenerativeModel`] capabilities. Content larger than a
//! model's context window goes through the [`OverlapReducer`], which compresses it
//! chunk by chunk until it fits.

pub mod blocking;
pub mod completion;
pub mod conversation;
pub mod models;
pub mod overlap;
pub mod prompt;
pub mod registry;
pub mod sender;
pub mod tokenizer;

#[cfg(test)]
mod test_utils;

pub use completion::{CompletionFailure, CompletionResult, GenerationParams};
pub use conversation::{
    truncate, ConversationError, ConversationSession, ErrorBody, Message, SendOutcome, SendResult,
};
pub use models::{
    overlap_reducer, ChatModel, GenerativeModel, ModelCapabilities, ModelError, OverlapExt,
    TextModel,
};
pub use overlap::{
    split_with_overlap, OverlapOptions, OverlapReducer, TokenWindow,
    DEFAULT_COMPRESSING_INSTRUCTION, DEFAULT_OVERLAP_PERCENT,
};
pub use prompt::{build_prompt, PromptExample};
pub use registry::{ModelConstructor, ModelRegistry, RegistryError};
pub use sender::MessageSender;
pub use tokenizer::{TiktokenTokenizer, Token, Tokenizer, TokenizerError};
