//! Collection orchestration
//!
//! The shared [`ItemCollector`] contract is a plain capability trait: any
//! per-item-type collector exposing `collect_items` can be driven directly
//! or wrapped by [`windowed::WindowedCollector`] when a date range risks
//! tripping the search API's result ceiling.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

use crate::batch::BatchError;
use crate::github::ApiError;
use crate::ItemKind;

pub mod search;
pub mod window;
pub mod windowed;

pub use search::{GitHubSearchCounter, SearchCollector};
pub use window::{SearchCounter, TimeWindow, WindowPlanner};
pub use windowed::WindowedCollector;

/// Collection errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Transport-level failure, already classified
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Batch persistence failure
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// Request failed validation before any API call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The API answered with a shape the collector cannot use
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for collection operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Immutable descriptor of one collection run.
///
/// Per-window derivations produced by [`CollectionRequest::for_window`]
/// differ only in date bounds, `clean` and `batch_offset`.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    /// Repository in `owner/name` form
    pub repository: String,
    /// Item type being collected
    pub item_kind: ItemKind,
    /// Item state filter (`open` / `closed` / `all`), if any
    pub state: Option<String>,
    /// Inclusive lower creation-date bound
    pub since: Option<NaiveDate>,
    /// Exclusive upper creation-date bound
    pub until: Option<NaiveDate>,
    /// Items persisted per batch file
    pub batch_size: usize,
    /// Whether to clean previous batch files before collecting
    pub clean: bool,
    /// Number of batch files already written by earlier runs or windows;
    /// numbering continues at `batch_offset + 1`
    pub batch_offset: usize,
}

impl CollectionRequest {
    /// Create a request with default batch sizing and a clean destination
    pub fn new(repository: impl Into<String>, item_kind: ItemKind) -> Self {
        Self {
            repository: repository.into(),
            item_kind,
            state: None,
            since: None,
            until: None,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            clean: true,
            batch_offset: 0,
        }
    }

    /// Set the state filter
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set the half-open creation-date range `[since, until)`
    #[must_use]
    pub fn with_date_range(mut self, since: NaiveDate, until: NaiveDate) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Set the batch size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the clean flag
    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Set the batch numbering offset
    #[must_use]
    pub fn with_batch_offset(mut self, batch_offset: usize) -> Self {
        self.batch_offset = batch_offset;
        self
    }

    /// The request's date range as a half-open window, when fully specified
    pub fn date_range(&self) -> Option<TimeWindow> {
        match (self.since, self.until) {
            (Some(since), Some(until)) if since < until => Some(TimeWindow::new(since, until)),
            _ => None,
        }
    }

    /// Derive the per-window copy forwarded to a delegate collector
    pub fn for_window(&self, window: TimeWindow, clean: bool, batch_offset: usize) -> Self {
        Self {
            since: Some(window.start),
            until: Some(window.end),
            clean,
            batch_offset,
            ..self.clone()
        }
    }

    /// Validate request invariants before issuing any API call
    pub fn validate(&self) -> CollectorResult<()> {
        let (owner, name) = self
            .repository
            .split_once('/')
            .ok_or_else(|| {
                CollectorError::InvalidRequest(format!(
                    "repository must be owner/name, got '{}'",
                    self.repository
                ))
            })?;
        if owner.is_empty() || name.is_empty() {
            return Err(CollectorError::InvalidRequest(format!(
                "repository must be owner/name, got '{}'",
                self.repository
            )));
        }

        if self.batch_size == 0 {
            return Err(CollectorError::InvalidRequest(
                "batch size must be at least 1".to_string(),
            ));
        }

        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since >= until {
                return Err(CollectorError::InvalidRequest(format!(
                    "date range is empty: {since} >= {until}"
                )));
            }
        }

        Ok(())
    }
}

/// Outcome of one collection run (or one window of a windowed run)
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    /// Server-reported total matching items
    pub total_count: u64,
    /// Items actually fetched and persisted
    pub processed_count: u64,
    /// Directory the batch files were written to
    pub output_directory: PathBuf,
    /// Batch file names in write order
    pub batch_files: Vec<String>,
}

impl CollectionResult {
    /// An empty result rooted at `output_directory`
    pub fn empty(output_directory: PathBuf) -> Self {
        Self {
            total_count: 0,
            processed_count: 0,
            output_directory,
            batch_files: Vec::new(),
        }
    }

    /// Merge a later window's result into this one.
    ///
    /// Associative: counts sum, file lists concatenate in window order, the
    /// receiver's output directory (the first window's) is kept.
    pub fn absorb(&mut self, other: CollectionResult) {
        self.total_count += other.total_count;
        self.processed_count += other.processed_count;
        self.batch_files.extend(other.batch_files);
    }
}

/// Capability contract shared by all per-item-type collectors
#[async_trait]
pub trait ItemCollector: Send + Sync {
    /// Collect every item matching `request` into numbered batch files
    async fn collect_items(&self, request: &CollectionRequest) -> CollectorResult<CollectionResult>;
}
