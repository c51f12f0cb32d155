//! Token counting.
//!
//! Two tiktoken encodings cover the supported model families: newer
//! OpenAI chat and reasoning models tokenize with `o200k_base`, everything
//! else falls back to `cl100k_base`. Both encoders are built once at
//! startup; counting is a pure lookup-and-encode after that. The counts
//! still may differ slightly from provider billing for some models, but
//! they track real usage far closer than chars/4.

use tiktoken_rs::CoreBPE;

use crate::error::TokenizerError;
use crate::pricing::normalize_model;

/// Model families that tokenize with `o200k_base`. Matched against the
/// normalized model name by equality or prefix.
const O200K_FAMILIES: &[&str] = &[
    "gpt-4o",
    "gpt-4.1",
    "gpt-5",
    "chatgpt-4o",
    "o1",
    "o3",
    "o4",
];

/// A tokenizer backend: text in, token identifiers out. The counter only
/// ever uses the sequence length.
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
}

struct Tiktoken(CoreBPE);

impl Encoder for Tiktoken {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.0.encode_ordinary(text)
    }
}

/// Token counter with both encodings pre-built.
pub struct TokenCounter {
    cl100k: Tiktoken,
    o200k: Tiktoken,
}

impl TokenCounter {
    /// Build both tiktoken encoders. This is the expensive step; do it
    /// once at startup and share the counter.
    pub fn new() -> Result<Self, TokenizerError> {
        let cl100k = tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::Init {
            encoding: "cl100k_base",
            reason: e.to_string(),
        })?;
        let o200k = tiktoken_rs::o200k_base().map_err(|e| TokenizerError::Init {
            encoding: "o200k_base",
            reason: e.to_string(),
        })?;
        Ok(Self {
            cl100k: Tiktoken(cl100k),
            o200k: Tiktoken(o200k),
        })
    }

    /// Count tokens in `text` for `model`. The model name selects the
    /// encoding; unknown models count with `cl100k_base`.
    pub fn count(&self, text: &str, model: &str) -> usize {
        self.backend_for(model).encode(text).len()
    }

    fn backend_for(&self, model: &str) -> &dyn Encoder {
        if uses_o200k(normalize_model(model)) {
            &self.o200k
        } else {
            &self.cl100k
        }
    }
}

fn uses_o200k(normalized: &str) -> bool {
    O200K_FAMILIES
        .iter()
        .any(|family| normalized.starts_with(family))
}
