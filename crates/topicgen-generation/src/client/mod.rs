//! Completion client trait and implementations.
//!
//! The generator only needs two things from a model: a completion for a
//! prompt, and a token estimate consistent with how the model counts.

mod api;
mod mock;

pub use api::ApiCompletionClient;
pub use mock::{MockCompletionClient, MockReply};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tokens::TokenCounter;

/// Error type for completion calls.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Timeout waiting for response")]
    Timeout,

    /// The caller asked the run to stop while the call was pending
    #[error("Interrupted")]
    Interrupted,
}

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.0,
            top_p: 1.0,
        }
    }
}

/// A text completion backend.
#[async_trait]
pub trait CompletionClient: TokenCounter {
    /// Complete `prompt` and return the raw model text.
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = CompletionParams::default();
        assert_eq!(params.max_tokens, 1000);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.top_p, 1.0);
    }

    #[test]
    fn test_params_serialization() {
        let params = CompletionParams {
            max_tokens: 200,
            temperature: 0.5,
            top_p: 0.9,
        };
        let json = serde_json::to_string(&params).unwrap();
        let decoded: CompletionParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, decoded);
    }
}
