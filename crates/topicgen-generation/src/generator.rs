//! The per-document generation loop.
//!
//! Each document is formatted against the current topic list, sent to the
//! model, and the level-1 topics in the answer are merged into the tree.
//! The run converges once `early_stop` consecutive documents add nothing
//! new. Every way a run ends is a [`RunStatus`]; partial results survive
//! all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use topicgen_embeddings::EmbeddingModel;
use topicgen_tree::{Observation, TopicTree};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::budget::{BudgetStrategy, PromptBudgeter, PromptTemplate};
use crate::client::{CompletionClient, CompletionError};
use crate::config::GeneratorConfig;
use crate::documents::Document;
use crate::parser::parse_topics;

/// Cooperative stop request shared between the loop and a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One entry of the response log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEntry {
    /// Raw model output
    Completed(String),
    /// The run was cancelled while this document was in progress
    Interrupted,
    /// The completion failed for this document
    Error,
}

impl ResponseEntry {
    pub fn as_str(&self) -> &str {
        match self {
            ResponseEntry::Completed(text) => text,
            ResponseEntry::Interrupted => "Interrupted",
            ResponseEntry::Error => "Error",
        }
    }
}

impl Serialize for ResponseEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Lifecycle of a run. Everything but `Running` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// `early_stop` consecutive documents added no topic
    Converged,
    /// Cancelled by the caller
    Interrupted,
    /// A completion failed; the message says why
    Failed(String),
    /// Ran out of documents before converging
    Exhausted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Stop(RunStatus),
}

/// Counters for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub documents_processed: usize,
    pub topics_added: usize,
    pub duplicates_merged: usize,
    pub discarded_candidates: usize,
    pub empty_responses: usize,
    pub truncated_documents: usize,
    pub pruned_prompts: usize,
}

impl RunStats {
    fn start() -> Self {
        Self {
            run_id: Ulid::new().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            documents_processed: 0,
            topics_added: 0,
            duplicates_merged: 0,
            discarded_candidates: 0,
            empty_responses: 0,
            truncated_documents: 0,
            pruned_prompts: 0,
        }
    }
}

/// Mutable state of one run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub tree: TopicTree,
    /// `[level] name: description` view of the tree, rebuilt after every insert
    pub topics_list: Vec<String>,
    pub docs_since_new_topic: usize,
    pub responses: Vec<ResponseEntry>,
    pub stats: RunStats,
}

impl RunState {
    pub fn new(tree: TopicTree) -> Self {
        let topics_list = tree.to_topic_list(true, false);
        Self {
            tree,
            topics_list,
            docs_since_new_topic: 0,
            responses: Vec::new(),
            stats: RunStats::start(),
        }
    }

    fn refresh_topics(&mut self) {
        self.topics_list = self.tree.to_topic_list(true, false);
    }

    fn stop(&mut self, entry: ResponseEntry, status: RunStatus) -> StepOutcome {
        self.responses.push(entry);
        StepOutcome::Stop(status)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub status: RunStatus,
    pub tree: TopicTree,
    pub topics_list: Vec<String>,
    pub responses: Vec<ResponseEntry>,
    pub stats: RunStats,
}

/// Drives first-level topic generation over a document sequence.
pub struct TopicGenerator<C> {
    client: Arc<C>,
    budgeter: PromptBudgeter,
    template: PromptTemplate,
    config: GeneratorConfig,
    cancel: CancellationFlag,
}

impl<C: CompletionClient + 'static> TopicGenerator<C> {
    pub fn new(client: Arc<C>, template: PromptTemplate, config: GeneratorConfig) -> Self {
        let budgeter = PromptBudgeter::new(client.clone(), config.max_topic_headroom);
        Self {
            client,
            budgeter,
            template,
            config,
            cancel: CancellationFlag::new(),
        }
    }

    /// Rank topics by similarity when a prompt needs pruning.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        self.budgeter = self.budgeter.with_embedder(embedder);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run at the next document boundary.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Process one document.
    pub async fn step(&self, state: &mut RunState, document: &Document) -> StepOutcome {
        if self.cancel.is_cancelled() {
            info!(doc = %document.id, "Cancelled before document");
            return state.stop(ResponseEntry::Interrupted, RunStatus::Interrupted);
        }

        let formatted = self.budgeter.format_prompt(
            &self.template,
            &document.text,
            &state.topics_list,
            self.config.token_limit,
        );
        match formatted.strategy {
            BudgetStrategy::Full => {}
            BudgetStrategy::TruncatedDocument { topics_pruned } => {
                state.stats.truncated_documents += 1;
                if topics_pruned {
                    state.stats.pruned_prompts += 1;
                }
            }
            BudgetStrategy::SimilarityPruned | BudgetStrategy::GreedyPruned => {
                state.stats.pruned_prompts += 1;
            }
        }
        debug!(
            doc = %document.id,
            strategy = ?formatted.strategy,
            topics = formatted.topics_included,
            of = formatted.topics_total,
            "Formatted prompt"
        );

        let response = match self.client.complete(&formatted.prompt, &self.config.params).await {
            Ok(text) => text,
            Err(CompletionError::Interrupted) => {
                info!(doc = %document.id, "Completion interrupted");
                return state.stop(ResponseEntry::Interrupted, RunStatus::Interrupted);
            }
            Err(e) => {
                warn!(doc = %document.id, error = %e, "Completion failed, stopping run");
                return state.stop(ResponseEntry::Error, RunStatus::Failed(e.to_string()));
            }
        };

        if self.cancel.is_cancelled() {
            info!(doc = %document.id, "Cancelled during completion, discarding response");
            return state.stop(ResponseEntry::Interrupted, RunStatus::Interrupted);
        }
        debug!(doc = %document.id, response = %response, "Model response");

        let candidates = parse_topics(&response);
        if candidates.is_empty() {
            debug!(doc = %document.id, "No topics in response");
            state.stats.empty_responses += 1;
        }

        let mut added_new_topic = false;
        for candidate in candidates {
            if candidate.level != 1 {
                warn!(doc = %document.id, topic = %candidate, "Discarding non-level-1 topic");
                state.stats.discarded_candidates += 1;
                continue;
            }
            match state.tree.observe(&candidate.name, &candidate.description) {
                Ok(Observation::Added(id)) => {
                    info!(%id, name = %candidate.name, "New topic");
                    state.stats.topics_added += 1;
                    added_new_topic = true;
                    state.refresh_topics();
                }
                Ok(Observation::Merged { count, .. }) => {
                    debug!(name = %candidate.name, count, "Duplicate topic");
                    state.stats.duplicates_merged += 1;
                }
                Err(e) => {
                    warn!(doc = %document.id, error = %e, "Topic tree rejected candidate");
                    return state.stop(ResponseEntry::Error, RunStatus::Failed(e.to_string()));
                }
            }
        }

        state.responses.push(ResponseEntry::Completed(response));
        state.stats.documents_processed += 1;

        if added_new_topic {
            state.docs_since_new_topic = 0;
        } else {
            state.docs_since_new_topic += 1;
            if state.docs_since_new_topic >= self.config.early_stop {
                info!(
                    docs = state.docs_since_new_topic,
                    "No new topics for early_stop documents, converged"
                );
                return StepOutcome::Stop(RunStatus::Converged);
            }
        }
        StepOutcome::Continue
    }

    /// Run over `documents` in order, starting from `tree`.
    pub async fn run(&self, tree: TopicTree, documents: &[Document]) -> GenerationOutcome {
        let mut state = RunState::new(tree);
        info!(
            run_id = %state.stats.run_id,
            documents = documents.len(),
            seed_topics = state.tree.len(),
            "Starting topic generation"
        );

        let mut status = RunStatus::Exhausted;
        for document in documents {
            if let StepOutcome::Stop(terminal) = self.step(&mut state, document).await {
                status = terminal;
                break;
            }
        }

        state.stats.finished_at = Some(Utc::now());
        info!(
            run_id = %state.stats.run_id,
            status = ?status,
            attempted = state.responses.len(),
            topics = state.tree.len(),
            added = state.stats.topics_added,
            "Topic generation finished"
        );

        GenerationOutcome {
            status,
            topics_list: state.tree.to_topic_list(true, false),
            tree: state.tree,
            responses: state.responses,
            stats: state.stats,
        }
    }
}
