//! Configuration loading for topic generation runs.
//!
//! Layered config: defaults -> user config file -> run config files -> env vars.
//! The user config lives at ~/.config/topicgen/config.{toml,yaml,json}.
//! Env vars use the `TOPICGEN_` prefix and `__` between nested keys,
//! e.g. `TOPICGEN_GENERATION__EARLY_STOP=20`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

/// Completion API flavour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ApiProvider {
    /// OpenAI chat completions, or any server speaking the same protocol
    #[default]
    #[serde(
        rename = "openai",
        alias = "openai-compatible",
        alias = "vllm",
        alias = "azure"
    )]
    OpenAi,
    /// Anthropic messages API
    #[serde(rename = "anthropic", alias = "claude")]
    Anthropic,
}

impl ApiProvider {
    /// Default base URL for the provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "https://api.openai.com/v1",
            ApiProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Environment variable consulted when no key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "OPENAI_API_KEY",
            ApiProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default, alias = "api_type")]
    pub provider: ApiProvider,

    /// Model name (e.g., "gpt-4", "gpt-4o-mini", "claude-3-haiku-20240307")
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL override (for vLLM or other compatible servers)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key; falls back to the provider's env var when unset
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            provider: ApiProvider::default(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ApiSettings {
    /// Base URL to use, falling back to the provider default.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    /// API key from config, or from the provider's env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(self.provider.api_key_env()).ok())
    }
}

/// First-level topic generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Prompt template file with {Document} and {Topics} placeholders
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Seed topic file
    #[serde(default = "default_seed")]
    pub seed: String,

    /// JSONL response log
    #[serde(default = "default_output")]
    pub output: String,

    /// Generated topic file
    #[serde(default = "default_topic_output")]
    pub topic_output: String,

    /// Consecutive documents without a new topic before stopping
    #[serde(default = "default_early_stop")]
    pub early_stop: usize,

    /// Maximum output tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Tokens reserved for the topic section when a document is truncated
    #[serde(default = "default_max_topic_headroom")]
    pub max_topic_headroom: usize,

    /// Model context window; derived from the model name when unset
    #[serde(default)]
    pub context_window: Option<usize>,
}

fn default_prompt() -> String {
    "prompt/generation_1.txt".to_string()
}

fn default_seed() -> String {
    "prompt/seed_1.md".to_string()
}

fn default_output() -> String {
    "data/output/generation_1.jsonl".to_string()
}

fn default_topic_output() -> String {
    "data/output/generation_1.md".to_string()
}

fn default_early_stop() -> usize {
    50
}

fn default_max_tokens() -> usize {
    1000
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_topic_headroom() -> usize {
    500
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            seed: default_seed(),
            output: default_output(),
            topic_output: default_topic_output(),
            early_stop: default_early_stop(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            top_p: default_top_p(),
            max_topic_headroom: default_max_topic_headroom(),
            context_window: None,
        }
    }
}

/// Optional embedding model used to rank topics when pruning prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model cache directory; OS cache dir when unset
    #[serde(default)]
    pub cache_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
        }
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    /// JSONL corpus with a `text` field per line
    #[serde(default = "default_data", alias = "data_sample")]
    pub data: String,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub embeddings: EmbeddingSettings,

    /// Log every prompt decision and response at debug level
    #[serde(default)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data() -> String {
    "data/input/sample.jsonl".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            data: default_data(),
            generation: GenerationSettings::default(),
            embeddings: EmbeddingSettings::default(),
            verbose: false,
            log_level: default_log_level(),
        }
    }
}

/// Context windows for models with small windows; everything else gets 128k.
fn context_window_for_model(model: &str) -> usize {
    match model {
        "gpt-3.5-turbo" => 4096,
        "gpt-4" => 8000,
        _ => 128_000,
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. User config file (~/.config/topicgen/config.*)
    /// 3. Run config file (optional, required to exist when given)
    /// 4. Environment variables (TOPICGEN_*)
    ///
    /// Values are not validated here. CLI flags should be applied by the
    /// caller after this returns, followed by [`Settings::validate`].
    pub fn load(run_config_path: Option<&Path>) -> Result<Self, SettingsError> {
        let config_dir = ProjectDirs::from("", "", "topicgen")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("api.model", default_model())?
            .set_default("generation.early_stop", default_early_stop() as i64)?
            .set_default("generation.max_tokens", default_max_tokens() as i64)?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = run_config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("TOPICGEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Context window of the configured model.
    pub fn context_window(&self) -> usize {
        self.generation
            .context_window
            .unwrap_or_else(|| context_window_for_model(&self.api.model))
    }

    /// Token limit for the prompt: the context window minus the output budget.
    pub fn prompt_token_limit(&self) -> usize {
        self.context_window()
            .saturating_sub(self.generation.max_tokens)
    }

    /// Plain-text backup path used when the JSONL response log cannot be written.
    pub fn backup_path(&self) -> PathBuf {
        let output = Path::new(&self.generation.output);
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "generation_1".to_string());
        let model = self.api.model.replace(['/', ':'], "_");
        output.with_file_name(format!("{stem}_backup_{model}.txt"))
    }

    /// Effective log filter, raised to debug for verbose runs.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose && self.log_level == "info" {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let g = &self.generation;
        if g.early_stop == 0 {
            return Err(SettingsError::Invalid("early_stop must be > 0".to_string()));
        }
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(SettingsError::Invalid(format!(
                "temperature must be 0.0-2.0, got {}",
                g.temperature
            )));
        }
        if !(g.top_p > 0.0 && g.top_p <= 1.0) {
            return Err(SettingsError::Invalid(format!(
                "top_p must be in (0.0, 1.0], got {}",
                g.top_p
            )));
        }
        if self.prompt_token_limit() <= g.max_topic_headroom {
            return Err(SettingsError::Invalid(format!(
                "prompt token limit {} cannot hold the {}-token topic headroom",
                self.prompt_token_limit(),
                g.max_topic_headroom
            )));
        }
        Ok(())
    }
}
