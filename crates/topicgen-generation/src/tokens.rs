//! Token estimation and truncation.

use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Rough characters-per-token ratio used when no tokenizer is available.
const CHARS_PER_TOKEN: usize = 4;

/// Counts and cuts text in model token units.
pub trait TokenCounter: Send + Sync {
    /// Estimated number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Longest prefix of `text` holding at most `max_tokens` tokens.
    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String;
}

/// BPE token counter.
///
/// Uses the model's own encoding when tiktoken knows the model, cl100k
/// otherwise, and a 4-chars-per-token estimate if neither loads.
pub struct TiktokenCounter {
    bpe: Option<CoreBPE>,
}

impl TiktokenCounter {
    /// Counter for a model name.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .map_err(|e| warn!(error = %e, "No BPE available, estimating tokens from length"))
            .ok();
        Self { bpe }
    }

    /// Counter using the cl100k encoding.
    pub fn cl100k() -> Self {
        Self {
            bpe: tiktoken_rs::cl100k_base().ok(),
        }
    }

    /// Counter using only the character estimate.
    pub fn heuristic() -> Self {
        Self { bpe: None }
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

fn truncate_chars(text: &str, max_tokens: usize) -> String {
    text.chars().take(max_tokens * CHARS_PER_TOKEN).collect()
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => estimate_tokens(text),
        }
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        let Some(bpe) = &self.bpe else {
            return truncate_chars(text, max_tokens);
        };
        let tokens = bpe.encode_with_special_tokens(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        // A cut can land inside a multi-byte character; back off until it decodes.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(prefix) = bpe.decode(tokens[..end].to_vec()) {
                return prefix;
            }
            end -= 1;
        }
        String::new()
    }
}

/// Whitespace word counter.
///
/// Deterministic and tokenizer-free; used by tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        text.split_whitespace()
            .take(max_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
