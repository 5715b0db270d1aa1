//! Search-backed count oracle and delegate collector
//!
//! Issues and pull requests are collected through the search API, which
//! supports the `created:` qualifier the window machinery relies on but
//! caps every query at [`crate::config::MAX_RESULTS_PER_QUERY`] results.
//! Collaborators have no creation date and come from the plain REST
//! listing instead.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::FsBatchStore;
use crate::config::MAX_RESULTS_PER_QUERY;
use crate::github::Transport;
use crate::ItemKind;

use super::window::{SearchCounter, TimeWindow};
use super::{CollectionRequest, CollectionResult, CollectorError, CollectorResult, ItemCollector};

/// Largest page size the API serves
const MAX_PAGE_SIZE: usize = 100;

/// Upper bound on listing pages to stop a pagination bug from looping forever
const MAX_PAGES: usize = 10_000;

/// Build the search query string for a request, optionally restricted to a
/// window. The half-open `[start, end)` contract maps onto the API's
/// inclusive `created:start..last-day` range syntax at day granularity.
pub fn search_query(request: &CollectionRequest, window: Option<TimeWindow>) -> String {
    let mut parts = vec![format!("repo:{}", request.repository)];

    if let Some(qualifier) = request.item_kind.search_qualifier() {
        parts.push(format!("is:{qualifier}"));
    }

    if let Some(state) = &request.state {
        if !state.eq_ignore_ascii_case("all") {
            parts.push(format!("state:{}", state.to_lowercase()));
        }
    }

    let (since, until) = match window {
        Some(w) => (Some(w.start), Some(w.end)),
        None => (request.since, request.until),
    };
    match (since, until) {
        (Some(since), Some(until)) => {
            let last_day = TimeWindow::new(since, until).last_day();
            parts.push(format!("created:{since}..{last_day}"));
        }
        (Some(since), None) => parts.push(format!("created:>={since}")),
        (None, Some(until)) => parts.push(format!("created:<{until}")),
        (None, None) => {}
    }

    parts.join(" ")
}

/// Count oracle backed by a one-result search probe
pub struct GitHubSearchCounter<T: Transport> {
    client: Arc<T>,
}

impl<T: Transport> GitHubSearchCounter<T> {
    /// Create a counter over the given transport
    pub fn new(client: Arc<T>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<T: Transport> SearchCounter for GitHubSearchCounter<T> {
    async fn count(&self, request: &CollectionRequest, window: TimeWindow) -> i64 {
        let query = search_query(request, Some(window));
        let params = [("q", query.clone()), ("per_page", "1".to_string())];

        match self.client.get_with_query("search/issues", &params).await {
            Ok(body) => match body.get("total_count").and_then(Value::as_i64) {
                Some(total) => total,
                None => {
                    warn!(query = %query, "Count response missing total_count");
                    -1
                }
            },
            Err(err) => {
                warn!(query = %query, error = %err, "Count probe failed");
                -1
            }
        }
    }
}

/// Concrete per-item-type collector persisting pages as numbered batches
pub struct SearchCollector<T: Transport> {
    client: Arc<T>,
    store: FsBatchStore,
}

impl<T: Transport> SearchCollector<T> {
    /// Create a collector writing through `store`
    pub fn new(client: Arc<T>, store: FsBatchStore) -> Self {
        Self { client, store }
    }

    /// Page the search endpoint, one batch file per page.
    ///
    /// Stops at exhaustion or at the API's hard result ceiling; the window
    /// machinery exists precisely so real runs stay under that ceiling.
    async fn collect_search(
        &self,
        request: &CollectionRequest,
        directory: std::path::PathBuf,
    ) -> CollectorResult<CollectionResult> {
        let mut result = CollectionResult::empty(directory.clone());
        let per_page = request.batch_size.min(MAX_PAGE_SIZE);
        let query = search_query(request, None);
        let mut page = 1usize;
        let mut batches_written = 0usize;

        loop {
            let params = [
                ("q", query.clone()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
                ("sort", "created".to_string()),
                ("order", "asc".to_string()),
            ];
            let body = self.client.get_with_query("search/issues", &params).await?;

            if page == 1 {
                result.total_count = body.get("total_count").and_then(Value::as_u64).unwrap_or(0);
            }

            let items = match body.get("items").and_then(Value::as_array) {
                Some(items) => items.clone(),
                None => {
                    return Err(CollectorError::UnexpectedResponse(
                        "search response missing 'items' array".to_string(),
                    ))
                }
            };
            if items.is_empty() {
                break;
            }

            let fetched = items.len();
            batches_written += 1;
            let index = request.batch_offset + batches_written;
            let file_name = self.store.save_batch(&directory, index, request, items)?;
            debug!(file = %file_name, items = fetched, page = page, "Persisted search page");
            result.processed_count += fetched as u64;
            result.batch_files.push(file_name);

            if fetched < per_page {
                break;
            }
            if ((page * per_page) as u64) >= MAX_RESULTS_PER_QUERY {
                warn!(
                    query = %query,
                    total_count = result.total_count,
                    "Search result ceiling reached; items past it are unreachable for this query"
                );
                break;
            }
            page += 1;
        }

        Ok(result)
    }

    /// Page a plain REST listing endpoint (collaborators), one batch file
    /// per page. The listing reports no total, so the total mirrors the
    /// processed count.
    async fn collect_listing(
        &self,
        request: &CollectionRequest,
        directory: std::path::PathBuf,
    ) -> CollectorResult<CollectionResult> {
        let mut result = CollectionResult::empty(directory.clone());
        let per_page = request.batch_size.min(MAX_PAGE_SIZE);
        let path = format!("repos/{}/collaborators", request.repository);
        let mut page = 1usize;
        let mut batches_written = 0usize;

        while page <= MAX_PAGES {
            let params = [
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ];
            let body = self.client.get_with_query(&path, &params).await?;

            let items = match body.as_array() {
                Some(items) => items.clone(),
                None => {
                    return Err(CollectorError::UnexpectedResponse(format!(
                        "listing response for {path} is not an array"
                    )))
                }
            };
            if items.is_empty() {
                break;
            }

            let fetched = items.len();
            batches_written += 1;
            let index = request.batch_offset + batches_written;
            let file_name = self.store.save_batch(&directory, index, request, items)?;
            debug!(file = %file_name, items = fetched, page = page, "Persisted listing page");
            result.processed_count += fetched as u64;
            result.batch_files.push(file_name);

            if fetched < per_page {
                break;
            }
            page += 1;
        }
        if page > MAX_PAGES {
            warn!(path = %path, pages = MAX_PAGES, "Listing page cap reached; stopping");
        }

        result.total_count = result.processed_count;
        Ok(result)
    }
}

#[async_trait]
impl<T: Transport> ItemCollector for SearchCollector<T> {
    async fn collect_items(&self, request: &CollectionRequest) -> CollectorResult<CollectionResult> {
        request.validate()?;

        if request.clean {
            self.store.clean_output_directory(request)?;
        }
        let directory = self.store.create_output_directory(request)?;

        info!(
            repository = %request.repository,
            item_kind = %request.item_kind,
            clean = request.clean,
            batch_offset = request.batch_offset,
            "Collecting items"
        );

        let result = match request.item_kind {
            ItemKind::Collaborators => self.collect_listing(request, directory).await?,
            _ => self.collect_search(request, directory).await?,
        };

        info!(
            repository = %request.repository,
            item_kind = %request.item_kind,
            processed = result.processed_count,
            batch_files = result.batch_files.len(),
            "Collection finished"
        );
        Ok(result)
    }
}
