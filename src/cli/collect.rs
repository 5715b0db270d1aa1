//! Collect command implementation

use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::batch::FsBatchStore;
use crate::collector::{
    CollectionRequest, GitHubSearchCounter, ItemCollector, SearchCollector, WindowPlanner,
    WindowedCollector,
};
use crate::github::{HttpTransport, RetryConfig, RetryingClient};
use crate::ItemKind;

use super::CliError;

/// Collect repository items into numbered batch files
#[derive(Parser, Debug)]
pub struct CollectCommand {
    /// Repository in owner/name form (e.g. rust-lang/rust)
    pub repository: String,

    /// Item kind to collect: issues, pulls or collaborators
    pub item_kind: ItemKind,

    /// Item state filter (open, closed or all)
    #[arg(long)]
    pub state: Option<String>,

    /// Inclusive creation-date lower bound (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Exclusive creation-date upper bound (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Items per batch file (capped at the API page size of 100)
    #[arg(long, default_value_t = crate::config::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Per-window result cap the planner splits against
    #[arg(long, default_value_t = crate::config::MAX_RESULTS_PER_QUERY)]
    pub max_per_window: u64,

    /// Root directory batch files are written under
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Keep previously collected batch files instead of cleaning first
    #[arg(long)]
    pub no_clean: bool,

    /// Batch numbering offset for resumed runs; numbering continues at
    /// offset + 1
    #[arg(long, default_value_t = 0)]
    pub batch_offset: usize,

    /// GitHub API token; falls back to the GITHUB_TOKEN environment
    /// variable (a .env file is honored)
    #[arg(long)]
    pub token: Option<String>,
}

impl CollectCommand {
    /// Execute the collect command
    pub async fn execute(&self, max_retries: u32) -> Result<(), CliError> {
        let token = resolve_token(self.token.as_deref())?;

        let transport = HttpTransport::new(token)?;
        let retry_config = RetryConfig::default().with_max_retries(max_retries);
        let client = Arc::new(RetryingClient::with_config(transport, retry_config));
        let store = FsBatchStore::new(&self.output_dir);

        let collector = WindowedCollector::new(
            SearchCollector::new(client.clone(), store),
            GitHubSearchCounter::new(client),
            WindowPlanner::new(self.max_per_window),
        );

        let mut request = CollectionRequest::new(&self.repository, self.item_kind)
            .with_batch_size(self.batch_size)
            .with_clean(!self.no_clean)
            .with_batch_offset(self.batch_offset);
        request.since = self.since;
        request.until = self.until;
        if let Some(state) = &self.state {
            request = request.with_state(state.as_str());
        }

        info!(
            repository = %self.repository,
            item_kind = %self.item_kind,
            "Starting collection"
        );

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!(
            "Collecting {} from {}",
            self.item_kind, self.repository
        ));

        let outcome = collector.collect_items(&request).await;
        spinner.finish_and_clear();
        let result = outcome?;

        println!("Collection complete:");
        println!("  Repository:   {}", self.repository);
        println!("  Item kind:    {}", self.item_kind);
        println!("  Total count:  {}", result.total_count);
        println!("  Processed:    {}", result.processed_count);
        println!("  Batch files:  {}", result.batch_files.len());
        println!("  Output:       {}", result.output_directory.display());

        Ok(())
    }
}

/// Resolve the API token from the CLI argument or the environment
fn resolve_token(arg: Option<&str>) -> Result<String, CliError> {
    match arg {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        _ => match std::env::var("GITHUB_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(CliError::InvalidArgument(
                "GitHub token required: pass --token or set GITHUB_TOKEN".to_string(),
            )),
        },
    }
}
