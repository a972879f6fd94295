//! Topic tree error types.

use thiserror::Error;

/// Errors that can occur while building or loading a topic tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Seed source held no parseable topic
    #[error("Seed parse error: {0}")]
    SeedParse(String),

    /// Node level does not sit directly below its parent
    #[error("Invalid level {level} for parent at level {parent_level}")]
    InvalidLevel { level: u32, parent_level: u32 },

    /// Node id not present in this tree
    #[error("Unknown topic node: {0}")]
    UnknownNode(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
