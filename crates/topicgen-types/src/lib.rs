//! # topicgen-types
//!
//! Shared settings and error types for the topic generation workspace.
//!
//! Settings are layered: built-in defaults, the user config file, any
//! run config files named on the command line, then `TOPICGEN_*`
//! environment variables. CLI flags are applied by the caller last.

pub mod config;
pub mod error;

pub use crate::config::{
    ApiProvider, ApiSettings, EmbeddingSettings, GenerationSettings, Settings,
};
pub use error::SettingsError;
