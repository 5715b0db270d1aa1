//! Windowed collection orchestration over a recording delegate

use async_trait::async_trait;
use chrono::NaiveDate;
use github_data_collector::batch::batch_file_name;
use github_data_collector::collector::{
    CollectionRequest, CollectionResult, CollectorError, CollectorResult, ItemCollector,
    SearchCounter, TimeWindow, WindowPlanner, WindowedCollector,
};
use github_data_collector::ItemKind;
use std::path::PathBuf;
use std::sync::Mutex;

/// Delegate that records every forwarded request and fabricates results
struct RecordingDelegate {
    requests: Mutex<Vec<CollectionRequest>>,
    batches_per_call: usize,
    fail_on_call: Option<usize>,
}

impl RecordingDelegate {
    fn new(batches_per_call: usize) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            batches_per_call,
            fail_on_call: None,
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn recorded(&self) -> Vec<CollectionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemCollector for RecordingDelegate {
    async fn collect_items(&self, request: &CollectionRequest) -> CollectorResult<CollectionResult> {
        let call_no = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if self.fail_on_call == Some(call_no) {
            return Err(CollectorError::UnexpectedResponse(
                "window exploded".to_string(),
            ));
        }

        let batch_files = (1..=self.batches_per_call)
            .map(|i| batch_file_name(request.batch_offset + i, request.item_kind.type_name()))
            .collect();
        Ok(CollectionResult {
            total_count: 750,
            processed_count: 700,
            output_directory: PathBuf::from(format!("/out/call{call_no}")),
            batch_files,
        })
    }
}

/// Count oracle driven by a closure
struct FnCounter<F: Fn(TimeWindow) -> i64 + Send + Sync> {
    count_fn: F,
}

impl<F: Fn(TimeWindow) -> i64 + Send + Sync> FnCounter<F> {
    fn new(count_fn: F) -> Self {
        Self { count_fn }
    }
}

#[async_trait]
impl<F: Fn(TimeWindow) -> i64 + Send + Sync> SearchCounter for FnCounter<F> {
    async fn count(&self, _request: &CollectionRequest, window: TimeWindow) -> i64 {
        (self.count_fn)(window)
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Full year splitting into two 750-count halves under a 900 cap
fn splitting_counter() -> FnCounter<impl Fn(TimeWindow) -> i64 + Send + Sync> {
    let full = TimeWindow::new(date("2023-01-01"), date("2024-01-01"));
    FnCounter::new(move |w: TimeWindow| if w == full { 1500 } else { 750 })
}

fn ranged_request() -> CollectionRequest {
    CollectionRequest::new("octocat/hello-world", ItemKind::Issues)
        .with_date_range(date("2023-01-01"), date("2024-01-01"))
}

#[tokio::test]
async fn test_two_windows_merge_counts_files_and_directory() {
    let collector = WindowedCollector::new(
        RecordingDelegate::new(2),
        splitting_counter(),
        WindowPlanner::new(900),
    );

    let result = collector.collect_items(&ranged_request()).await.unwrap();

    assert_eq!(result.total_count, 1500);
    assert_eq!(result.processed_count, 1400);
    // First window's output directory is kept
    assert_eq!(result.output_directory, PathBuf::from("/out/call1"));
    // Ordered concatenation with globally contiguous numbering
    assert_eq!(
        result.batch_files,
        vec![
            "batch_001_issues.json",
            "batch_002_issues.json",
            "batch_003_issues.json",
            "batch_004_issues.json",
        ]
    );

    let forwarded = collector.delegate().recorded();
    assert_eq!(forwarded.len(), 2);

    let mid = date("2023-07-02");
    // Window 0: cleans, zero offset, first half of the range
    assert!(forwarded[0].clean);
    assert_eq!(forwarded[0].batch_offset, 0);
    assert_eq!(forwarded[0].since, Some(date("2023-01-01")));
    assert_eq!(forwarded[0].until, Some(mid));
    // Window 1: never cleans, offset equals window 0's batch count
    assert!(!forwarded[1].clean);
    assert_eq!(forwarded[1].batch_offset, 2);
    assert_eq!(forwarded[1].since, Some(mid));
    assert_eq!(forwarded[1].until, Some(date("2024-01-01")));
}

#[tokio::test]
async fn test_original_offset_composes_with_window_offsets() {
    let collector = WindowedCollector::new(
        RecordingDelegate::new(2),
        splitting_counter(),
        WindowPlanner::new(900),
    );

    let request = ranged_request().with_batch_offset(3);
    let result = collector.collect_items(&request).await.unwrap();

    let forwarded = collector.delegate().recorded();
    assert_eq!(forwarded[0].batch_offset, 3);
    assert_eq!(forwarded[1].batch_offset, 5);
    assert_eq!(
        result.batch_files,
        vec![
            "batch_004_issues.json",
            "batch_005_issues.json",
            "batch_006_issues.json",
            "batch_007_issues.json",
        ]
    );
}

#[tokio::test]
async fn test_request_without_date_range_is_forwarded_untouched() {
    let collector = WindowedCollector::new(
        RecordingDelegate::new(1),
        FnCounter::new(|_| 1500),
        WindowPlanner::new(900),
    );

    let request = CollectionRequest::new("octocat/hello-world", ItemKind::Collaborators);
    collector.collect_items(&request).await.unwrap();

    let forwarded = collector.delegate().recorded();
    assert_eq!(forwarded.len(), 1);
    assert!(forwarded[0].clean);
    assert_eq!(forwarded[0].batch_offset, 0);
    assert_eq!(forwarded[0].since, None);
    assert_eq!(forwarded[0].until, None);
}

#[tokio::test]
async fn test_range_that_fits_is_forwarded_after_one_probe() {
    let counter = FnCounter::new(|_| 100);
    let collector =
        WindowedCollector::new(RecordingDelegate::new(1), counter, WindowPlanner::new(900));

    collector.collect_items(&ranged_request()).await.unwrap();

    let forwarded = collector.delegate().recorded();
    assert_eq!(forwarded.len(), 1);
    // The original bounds and flags pass through unchanged
    assert!(forwarded[0].clean);
    assert_eq!(forwarded[0].since, Some(date("2023-01-01")));
    assert_eq!(forwarded[0].until, Some(date("2024-01-01")));
}

#[tokio::test]
async fn test_resume_run_with_clean_false_never_cleans_any_window() {
    let collector = WindowedCollector::new(
        RecordingDelegate::new(2),
        splitting_counter(),
        WindowPlanner::new(900),
    );

    let request = ranged_request().with_clean(false);
    collector.collect_items(&request).await.unwrap();

    let forwarded = collector.delegate().recorded();
    assert_eq!(forwarded.len(), 2);
    assert!(forwarded.iter().all(|r| !r.clean));
}

#[tokio::test]
async fn test_failing_window_aborts_the_run() {
    let collector = WindowedCollector::new(
        RecordingDelegate::new(2).failing_on(2),
        splitting_counter(),
        WindowPlanner::new(900),
    );

    let err = collector.collect_items(&ranged_request()).await.unwrap_err();
    assert!(matches!(err, CollectorError::UnexpectedResponse(_)));
    // The failure surfaced on window 2; no further windows were attempted
    assert_eq!(collector.delegate().recorded().len(), 2);
}
