//! # topicgen-generation
//!
//! First-level topic generation: prompt each document against the current
//! topic list, parse the topics the model proposes, merge them into the
//! tree, and stop once new topics stop appearing.
//!
//! ## Modules
//! - `parser`: `[level] name: description` extraction from model output
//! - `budget`: fitting a document and topic list into the prompt window
//! - `generator`: the per-document loop and its terminal states
//! - `client`: completion client trait, HTTP client and scripted mock
//! - `tokens`: token estimation and truncation
//! - `documents`: JSONL corpus input and response log output
//! - `job`: one full run driven by [`topicgen_types::Settings`]

pub mod budget;
pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod generator;
pub mod job;
pub mod parser;
pub mod tokens;

pub use budget::{BudgetStrategy, FormattedPrompt, PromptBudget, PromptBudgeter, PromptTemplate};
pub use client::{
    ApiCompletionClient, CompletionClient, CompletionError, CompletionParams, MockCompletionClient,
    MockReply,
};
pub use config::GeneratorConfig;
pub use documents::{load_documents, persist_responses, write_response_log, Document, PersistOutcome};
pub use error::GenerationError;
pub use generator::{
    CancellationFlag, GenerationOutcome, ResponseEntry, RunState, RunStats, RunStatus, StepOutcome,
    TopicGenerator,
};
pub use job::{run_job, JobReport};
pub use parser::parse_topics;
pub use tokens::{TiktokenCounter, TokenCounter, WordCounter};
