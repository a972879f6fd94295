//! Generation error types.

use thiserror::Error;

use crate::client::CompletionError;

/// Errors that can occur around a generation run.
///
/// Failures inside the document loop do not surface here; they end the run
/// with [`crate::RunStatus::Failed`] and keep partial results.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Topic tree error
    #[error("Topic tree error: {0}")]
    Tree(#[from] topicgen_tree::TreeError),

    /// Completion client error outside the loop (e.g. client construction)
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Settings error
    #[error("Settings error: {0}")]
    Settings(#[from] topicgen_types::SettingsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed input corpus or template
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
