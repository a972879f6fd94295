//! Error types for settings loading.

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration loaded but holds an unusable value
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl From<::config::ConfigError> for SettingsError {
    fn from(err: ::config::ConfigError) -> Self {
        SettingsError::Config(err.to_string())
    }
}
