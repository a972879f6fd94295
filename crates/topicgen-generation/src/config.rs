//! Generator configuration.

use topicgen_types::Settings;

use crate::client::CompletionParams;

/// Per-run knobs of the generation loop.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Consecutive documents without a new topic before the run converges
    pub early_stop: usize,

    /// Sampling parameters for every completion
    pub params: CompletionParams,

    /// Prompt token limit (context window minus output budget)
    pub token_limit: usize,

    /// Tokens kept free for topics when a document has to be truncated
    pub max_topic_headroom: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            early_stop: 50,
            params: CompletionParams::default(),
            token_limit: 7000,
            max_topic_headroom: 500,
        }
    }
}

impl GeneratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let g = &settings.generation;
        Self {
            early_stop: g.early_stop,
            params: CompletionParams {
                max_tokens: g.max_tokens,
                temperature: g.temperature,
                top_p: g.top_p,
            },
            token_limit: settings.prompt_token_limit(),
            max_topic_headroom: g.max_topic_headroom,
        }
    }

    pub fn with_early_stop(mut self, early_stop: usize) -> Self {
        self.early_stop = early_stop;
        self
    }

    pub fn with_token_limit(mut self, token_limit: usize) -> Self {
        self.token_limit = token_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_settings() {
        let config = GeneratorConfig::from_settings(&Settings::default());
        assert_eq!(config.early_stop, 50);
        assert_eq!(config.token_limit, 7000);
        assert_eq!(config.max_topic_headroom, 500);
        assert_eq!(config.params, CompletionParams::default());
    }

    #[test]
    fn test_from_custom_settings() {
        let mut settings = Settings::default();
        settings.api.model = "gpt-3.5-turbo".to_string();
        settings.generation.max_tokens = 500;
        settings.generation.early_stop = 10;
        let config = GeneratorConfig::from_settings(&settings);
        assert_eq!(config.token_limit, 4096 - 500);
        assert_eq!(config.params.max_tokens, 500);
        assert_eq!(config.early_stop, 10);
    }
}
