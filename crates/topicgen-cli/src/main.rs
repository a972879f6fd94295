//! topicgen
//!
//! Generates first-level topics for a document corpus with a language model.
//!
//! # Usage
//!
//! ```bash
//! topicgen generate [--config FILE]... [--data PATH] [--seed PATH] [--early-stop N]
//! topicgen parse <FILE>
//! topicgen show-seed <FILE> [--counts]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. User config file (~/.config/topicgen/config.{toml,yaml,json})
//! 3. Run config file (--config)
//! 4. Environment variables (TOPICGEN_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use topicgen_cli::{init_logging, run_generate, show_parsed, show_seed, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            run_generate(args, cli.log_level.as_deref()).await?;
        }
        Commands::Parse { file } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"))?;
            show_parsed(&file)?;
        }
        Commands::ShowSeed { file, counts } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"))?;
            show_seed(&file, counts)?;
        }
    }

    Ok(())
}
