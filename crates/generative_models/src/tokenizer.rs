//! Tokenizer adapter
//!
//! Token counts decide window sizes, so the encoder must be the one the target
//! model family is billed with. Tiktoken covers the OpenAI models.

use tiktoken_rs::CoreBPE;

pub type Token = u32;

#[derive(Debug, thiserror::Error)]
pub enum TokenizerError {
    #[error("No tokenizer available for model '{model}': {reason}")]
    UnsupportedModel { model: String, reason: String },

    #[error("Failed to decode tokens: {0}")]
    Decode(String),
}

/// Text to token ids and back.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<Token>;

    fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE tokenizer backed by `tiktoken-rs`
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Tokenizer of the given model. Unknown models are a configuration error.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            TokenizerError::UnsupportedModel {
                model: model.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        self.bpe.encode_ordinary(text)
    }

    /// A window boundary may cut a multi-byte character in half. When the whole slice
    /// doesn't decode, it is decoded character group by character group and every
    /// token that can't be completed becomes U+FFFD.
    fn decode(&self, tokens: &[Token]) -> Result<String, TokenizerError> {
        match self.bpe.decode(tokens.to_vec()) {
            Ok(text) => Ok(text),
            Err(_) => Ok(self.decode_lossy(tokens)),
        }
    }
}

impl TiktokenTokenizer {
    /// A UTF-8 character is at most four bytes and every token carries at least one.
    const MAX_TOKENS_PER_CHAR: usize = 4;

    fn decode_lossy(&self, tokens: &[Token]) -> String {
        let mut decoded = String::new();
        let mut start = 0;
        while start < tokens.len() {
            let longest = Self::MAX_TOKENS_PER_CHAR.min(tokens.len() - start);
            let group = (1..=longest).find_map(|len| {
                self.bpe
                    .decode(tokens[start..start + len].to_vec())
                    .ok()
                    .map(|text| (len, text))
            });
            match group {
                Some((len, text)) => {
                    decoded.push_str(&text);
                    start += len;
                }
                None => {
                    decoded.push(char::REPLACEMENT_CHARACTER);
                    start += 1;
                }
            }
        }
        decoded
    }
}
