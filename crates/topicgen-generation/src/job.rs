//! One generation run driven by [`Settings`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use topicgen_embeddings::EmbeddingModel;
use topicgen_tree::TopicTree;
use topicgen_types::Settings;
use tracing::{error, info, instrument, warn};

use crate::budget::PromptTemplate;
use crate::client::CompletionClient;
use crate::config::GeneratorConfig;
use crate::documents::{load_documents, persist_responses, PersistOutcome};
use crate::error::GenerationError;
use crate::generator::{CancellationFlag, RunStats, RunStatus, TopicGenerator};

/// Summary of a finished job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub status: RunStatus,
    pub stats: RunStats,
    pub documents_total: usize,
    pub documents_attempted: usize,
    pub topic_count: usize,
    pub topic_file: PathBuf,
    /// Response log path, or the backup path if the log could not be written
    pub response_file: PathBuf,
    pub response_log_backed_up: bool,
}

/// Load inputs, run generation, and write the topic file and response log.
///
/// Outputs are written for every terminal status. Errors are returned only
/// for unreadable inputs or unwritable outputs. The response log is written
/// before the topic file, so responses survive a failed topic write.
#[instrument(skip_all, fields(model = %settings.api.model, data = %settings.data))]
pub async fn run_job<C: CompletionClient + 'static>(
    settings: &Settings,
    client: Arc<C>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    cancel: CancellationFlag,
) -> Result<JobReport, GenerationError> {
    let g = &settings.generation;
    let template = PromptTemplate::from_file(Path::new(&g.prompt))?;
    let tree = TopicTree::from_seed_file(Path::new(&g.seed))?;
    let documents = load_documents(Path::new(&settings.data))?;

    let mut generator = TopicGenerator::new(client, template, GeneratorConfig::from_settings(settings))
        .with_cancellation(cancel);
    if let Some(embedder) = embedder {
        generator = generator.with_embedder(embedder);
    }

    let outcome = generator.run(tree, &documents).await;

    let persisted = persist_responses(
        Path::new(&g.output),
        &settings.backup_path(),
        &documents,
        &outcome.responses,
    )?;
    let (response_file, response_log_backed_up) = match persisted {
        PersistOutcome::Written(path) => (path, false),
        PersistOutcome::BackedUp(path) => (path, true),
    };

    let topic_file = PathBuf::from(&g.topic_output);
    if let Err(e) = outcome.tree.to_file(&topic_file) {
        error!(
            error = %e,
            topic_file = %topic_file.display(),
            responses = %response_file.display(),
            "Failed to write topic file"
        );
        return Err(e.into());
    }

    match &outcome.status {
        RunStatus::Converged | RunStatus::Exhausted => {
            info!(status = ?outcome.status, topics = outcome.tree.len(), "Job complete")
        }
        other => warn!(status = ?other, topics = outcome.tree.len(), "Job ended early"),
    }

    Ok(JobReport {
        status: outcome.status,
        documents_total: documents.len(),
        documents_attempted: outcome.responses.len(),
        topic_count: outcome.tree.len(),
        stats: outcome.stats,
        topic_file,
        response_file,
        response_log_backed_up,
    })
}
