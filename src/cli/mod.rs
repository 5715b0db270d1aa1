//! CLI command implementations

use clap::{Parser, Subcommand};

pub mod collect;
pub mod error;
pub mod verify;

pub use collect::CollectCommand;
pub use error::CliError;
pub use verify::{DedupCommand, VerifyCommand};

/// Collect GitHub repository data into verified, deduplicated batch files
#[derive(Parser, Debug)]
#[command(name = "github-data-collector", version, about)]
pub struct Cli {
    /// Maximum retries for failed API calls
    #[arg(long, global = true, default_value_t = crate::config::MAX_RETRIES)]
    pub max_retries: u32,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect repository items into numbered batch files
    Collect(CollectCommand),
    /// Verify previously collected batch files
    Verify(VerifyCommand),
    /// Remove duplicates found by verification and renumber batches
    Dedup(DedupCommand),
}
