//! Main entry point for the github-data-collector CLI

use clap::Parser;
use github_data_collector::cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("github_data_collector=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    // Pick up GITHUB_TOKEN and friends from a local .env, if present
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Collect(ref cmd) => cmd
            .execute(cli.max_retries)
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Verify(ref cmd) => cmd.execute().await.map_err(|e| anyhow::anyhow!(e)),
        Commands::Dedup(ref cmd) => cmd.execute().await.map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
