//! # GitHub Data Collector Library
//!
//! A library for pulling large, paginated result sets out of the GitHub API
//! into numbered batch files on disk, built to survive the API's quota
//! limits and its hard per-query result ceiling.
//!
//! ## Features
//!
//! - **Adaptive Windowing**: date ranges expected to exceed the search
//!   result ceiling are bisected into time windows that each fit
//! - **Rate-Limit Awareness**: requests are paced against the remaining
//!   quota and retried with reset-aware or exponential backoff
//! - **Contiguous Batch Numbering**: windowed runs produce one globally
//!   numbered sequence of batch files, resumable via an offset
//! - **Post-Hoc Verification**: a separate pass reports duplicates, date
//!   and state violations, and count/numbering integrity issues
//! - **Deduplication**: verified findings drive an idempotent cleanup that
//!   rewrites, deletes and renumbers batch files
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use github_data_collector::batch::FsBatchStore;
//! use github_data_collector::collector::{
//!     CollectionRequest, GitHubSearchCounter, ItemCollector, SearchCollector, WindowPlanner,
//!     WindowedCollector,
//! };
//! use github_data_collector::github::{HttpTransport, RetryingClient};
//! use github_data_collector::ItemKind;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(RetryingClient::new(HttpTransport::new("<token>")?));
//! let store = FsBatchStore::new("./data");
//!
//! let collector = WindowedCollector::new(
//!     SearchCollector::new(client.clone(), store),
//!     GitHubSearchCounter::new(client),
//!     WindowPlanner::new(1000),
//! );
//!
//! let request = CollectionRequest::new("octocat/hello-world", ItemKind::Issues)
//!     .with_state("closed")
//!     .with_date_range("2023-01-01".parse()?, "2024-01-01".parse()?);
//! let result = collector.collect_items(&request).await?;
//! println!("{} items in {} batches", result.processed_count, result.batch_files.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`github`] - transport layer: raw HTTP client plus the rate-limit
//!   aware retrying decorator
//! - [`collector`] - window planning and the windowed orchestrator over
//!   per-item-type collectors
//! - [`batch`] - batch file model, store, verifier and deduplicator
//! - [`cli`] - command implementations
//! - [`config`] - tuning constants

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Batch file model, persistence, verification and deduplication
pub mod batch;

/// CLI command implementations
pub mod cli;

/// Collection orchestration and window planning
pub mod collector;

/// Tuning constants
pub mod config;

/// GitHub API transport and retry layers
pub mod github;

/// The kinds of repository data the collector knows how to pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Issues (excluding pull requests)
    #[serde(rename = "issues")]
    Issues,
    /// Pull requests
    #[serde(rename = "pulls")]
    PullRequests,
    /// Repository collaborators; carry no creation date, so date-ranged
    /// windowing does not apply
    #[serde(rename = "collaborators")]
    Collaborators,
}

impl ItemKind {
    /// Type name used in batch file names and as the item array key
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Issues => "issues",
            ItemKind::PullRequests => "pulls",
            ItemKind::Collaborators => "collaborators",
        }
    }

    /// Search qualifier (`is:issue` / `is:pr`), when the kind is
    /// searchable
    pub fn search_qualifier(&self) -> Option<&'static str> {
        match self {
            ItemKind::Issues => Some("issue"),
            ItemKind::PullRequests => Some("pr"),
            ItemKind::Collaborators => None,
        }
    }

    /// Whether items of this kind carry a creation date
    pub fn has_created_at(&self) -> bool {
        !matches!(self, ItemKind::Collaborators)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "issues" | "issue" => Ok(ItemKind::Issues),
            "pulls" | "prs" | "pull-requests" => Ok(ItemKind::PullRequests),
            "collaborators" => Ok(ItemKind::Collaborators),
            _ => Err(format!(
                "Invalid item kind: {s}. Valid options: issues, pulls, collaborators"
            )),
        }
    }
}
