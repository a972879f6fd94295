//! topicgen CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (generate, parse, show-seed)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, GenerateArgs};
pub use commands::{init_logging, load_run_settings, run_generate, show_parsed, show_seed};
