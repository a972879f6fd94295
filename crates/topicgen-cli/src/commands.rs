//! Command implementations for topicgen.
//!
//! Handles:
//! - generate: load each run config, run generation, write outputs
//! - parse: dry-run the response grammar over a saved answer
//! - show-seed: print a seed file as the model will see it

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{info, warn};

use topicgen_embeddings::{EmbeddingModel, LazyEmbedder, ModelCache, DEFAULT_MODEL_REPO};
use topicgen_generation::{parse_topics, run_job, ApiCompletionClient, CancellationFlag, RunStatus};
use topicgen_tree::TopicTree;
use topicgen_types::Settings;

use crate::cli::GenerateArgs;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load settings for one run and apply CLI overrides.
pub fn load_run_settings(
    config_path: Option<&Path>,
    args: &GenerateArgs,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).with_context(|| match config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(data) = &args.data {
        settings.data = data.clone();
    }
    if let Some(seed) = &args.seed {
        settings.generation.seed = seed.clone();
    }
    if let Some(early_stop) = args.early_stop {
        settings.generation.early_stop = early_stop;
    }
    if let Some(model) = &args.model {
        settings.api.model = model.clone();
    }
    if args.no_embeddings {
        settings.embeddings.enabled = false;
    }
    if args.verbose {
        settings.verbose = true;
    }
    if let Some(level) = log_level_override {
        settings.log_level = level.to_string();
    }

    settings
        .validate()
        .context("Invalid configuration after CLI overrides")?;
    Ok(settings)
}

fn build_embedder(settings: &Settings) -> Option<Arc<dyn EmbeddingModel>> {
    if !settings.embeddings.enabled {
        return None;
    }
    let cache = match &settings.embeddings.cache_dir {
        Some(dir) => ModelCache::new(dir, DEFAULT_MODEL_REPO),
        None => ModelCache::default(),
    };
    Some(Arc::new(LazyEmbedder::from_cache(cache)))
}

/// Cancel `flag` on the first Ctrl-C.
fn spawn_interrupt_handler(flag: CancellationFlag) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, stopping after the current document...");
                flag.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });
}

/// Run generation once per config file, or once with defaults.
pub async fn run_generate(args: GenerateArgs, log_level_override: Option<&str>) -> Result<()> {
    let configs: Vec<Option<PathBuf>> = if args.configs.is_empty() {
        vec![None]
    } else {
        args.configs.iter().cloned().map(Some).collect()
    };

    let runs = configs
        .iter()
        .map(|path| load_run_settings(path.as_deref(), &args, log_level_override))
        .collect::<Result<Vec<_>>>()?;

    let level = runs
        .first()
        .map(|s| s.effective_log_level().to_string())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level)?;

    let cancel = CancellationFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let mut failures = 0usize;
    for (index, settings) in runs.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(remaining = runs.len() - index, "Skipping remaining runs after interrupt");
            break;
        }
        info!(
            run = index + 1,
            of = runs.len(),
            model = %settings.api.model,
            data = %settings.data,
            "Starting run"
        );

        let client = Arc::new(
            ApiCompletionClient::from_settings(&settings.api)
                .context("Failed to create completion client")?,
        );
        let report = run_job(settings, client, build_embedder(settings), cancel.clone())
            .await
            .with_context(|| format!("Run {} failed", index + 1))?;

        if matches!(report.status, RunStatus::Failed(_)) {
            failures += 1;
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if failures > 0 {
        bail!("{} of {} runs ended with a completion failure", failures, runs.len());
    }
    Ok(())
}

/// Print the topics the parser finds in a saved response.
pub fn show_parsed(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let topics = parse_topics(&text);
    if topics.is_empty() {
        println!("No topics found");
    }
    for topic in topics {
        println!("{}", topic);
    }
    Ok(())
}

/// Print a seed file's flattened topic list.
pub fn show_seed(path: &Path, counts: bool) -> Result<()> {
    let tree = TopicTree::from_seed_file(path)
        .with_context(|| format!("Failed to load seed file {}", path.display()))?;
    for line in tree.to_topic_list(true, counts) {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_apply_after_config_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "data_sample: from-config.jsonl\ngeneration:\n  early_stop: 10\napi:\n  model: gpt-4"
        )
        .unwrap();

        let args = GenerateArgs {
            early_stop: Some(3),
            model: Some("gpt-4o-mini".to_string()),
            no_embeddings: true,
            ..Default::default()
        };
        let settings = load_run_settings(Some(file.path()), &args, Some("warn")).unwrap();

        assert_eq!(settings.data, "from-config.jsonl");
        assert_eq!(settings.generation.early_stop, 3);
        assert_eq!(settings.api.model, "gpt-4o-mini");
        assert!(!settings.embeddings.enabled);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_override_repairs_invalid_config_value() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "generation:\n  early_stop: 0").unwrap();

        let args = GenerateArgs {
            early_stop: Some(3),
            ..Default::default()
        };
        let settings = load_run_settings(Some(file.path()), &args, None).unwrap();
        assert_eq!(settings.generation.early_stop, 3);

        assert!(load_run_settings(Some(file.path()), &GenerateArgs::default(), None).is_err());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = GenerateArgs {
            early_stop: Some(0),
            ..Default::default()
        };
        assert!(load_run_settings(None, &args, None).is_err());
    }

    #[test]
    fn test_disabled_embeddings_build_nothing() {
        let mut settings = Settings::default();
        settings.embeddings.enabled = false;
        assert!(build_embedder(&settings).is_none());

        settings.embeddings.enabled = true;
        assert!(build_embedder(&settings).is_some());
    }

    #[test]
    fn test_show_seed_and_parse_read_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let seed = dir.path().join("seed.md");
        std::fs::write(&seed, "[1] Trade: goods\n").unwrap();
        assert!(show_seed(&seed, true).is_ok());
        assert!(show_seed(&dir.path().join("missing.md"), false).is_err());

        let response = dir.path().join("response.txt");
        std::fs::write(&response, "- [1] Sports: games").unwrap();
        assert!(show_parsed(&response).is_ok());
    }
}
