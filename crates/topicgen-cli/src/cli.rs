//! CLI argument parsing for topicgen.
//!
//! CLI flags override every other config source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Topic taxonomy generation
///
/// Builds a list of top-level topics from a document corpus by prompting a
/// language model one document at a time.
#[derive(Parser, Debug)]
#[command(name = "topicgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run first-level topic generation
    Generate(GenerateArgs),

    /// Print the topics found in a saved model response
    Parse {
        /// File holding raw model output
        file: PathBuf,
    },

    /// Print a seed file as the flattened topic list
    ShowSeed {
        /// Seed topic file
        file: PathBuf,

        /// Include counts
        #[arg(long)]
        counts: bool,
    },
}

/// Options for `generate`.
#[derive(clap::Args, Debug, Default)]
pub struct GenerateArgs {
    /// Run config file; repeat to run several configurations in order
    #[arg(short, long = "config")]
    pub configs: Vec<PathBuf>,

    /// Override the JSONL corpus
    #[arg(long)]
    pub data: Option<String>,

    /// Override the seed topic file
    #[arg(long)]
    pub seed: Option<String>,

    /// Override the convergence threshold
    #[arg(long)]
    pub early_stop: Option<usize>,

    /// Override the model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Prune prompts greedily instead of loading the embedding model
    #[arg(long)]
    pub no_embeddings: bool,

    /// Log prompt decisions and responses
    #[arg(short, long)]
    pub verbose: bool,
}
