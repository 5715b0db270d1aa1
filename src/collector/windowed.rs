//! Windowed collection orchestrator
//!
//! Wraps any [`ItemCollector`] delegate and, when a request's date range is
//! expected to exceed the search result cap, drives the delegate once per
//! planned window while keeping batch numbering globally contiguous.
//!
//! Windows are processed strictly sequentially in chronological order.
//! Parallel fan-out would break both offset contiguity and the
//! clean-exactly-once guarantee, so none is offered.

use async_trait::async_trait;
use tracing::{debug, info};

use super::window::{SearchCounter, WindowPlanner};
use super::{CollectionRequest, CollectionResult, CollectorResult, ItemCollector};

/// Drives a delegate collector once per planned time window
pub struct WindowedCollector<D, C> {
    delegate: D,
    counter: C,
    planner: WindowPlanner,
}

impl<D, C> WindowedCollector<D, C>
where
    D: ItemCollector,
    C: SearchCounter,
{
    /// Wrap `delegate`, splitting ranges whose expected count exceeds
    /// `planner`'s cap as measured by `counter`
    pub fn new(delegate: D, counter: C, planner: WindowPlanner) -> Self {
        Self {
            delegate,
            counter,
            planner,
        }
    }

    /// Access the wrapped delegate
    pub fn delegate(&self) -> &D {
        &self.delegate
    }
}

#[async_trait]
impl<D, C> ItemCollector for WindowedCollector<D, C>
where
    D: ItemCollector,
    C: SearchCounter,
{
    /// Collect `request`, splitting its date range into windows when needed.
    ///
    /// Guarantees, in windowed mode:
    /// - the destination is cleaned at most once, by window 0;
    /// - window *k* is forwarded with a batch offset equal to the original
    ///   offset plus the batch files written by windows `0..k`;
    /// - batch files land in chronological window order.
    ///
    /// Delegate failures are not caught: a failing window aborts the run
    /// and leaves earlier windows' files on disk for caller-driven
    /// resumption.
    async fn collect_items(&self, request: &CollectionRequest) -> CollectorResult<CollectionResult> {
        request.validate()?;

        let Some(range) = request.date_range() else {
            debug!(
                repository = %request.repository,
                item_kind = %request.item_kind,
                "No complete date range; forwarding to delegate"
            );
            return self.delegate.collect_items(request).await;
        };

        let probe = self.counter.count(request, range).await;
        if probe <= self.planner.max_per_window() as i64 {
            // A negative probe is the oracle's error sentinel and lands
            // here too: assume it fits rather than stall the run.
            debug!(range = %range, count = probe, "Full range fits; forwarding to delegate");
            return self.delegate.collect_items(request).await;
        }

        let windows = self.planner.plan(range, request, &self.counter).await;
        info!(
            repository = %request.repository,
            item_kind = %request.item_kind,
            range = %range,
            expected_total = probe,
            windows = windows.len(),
            "Partitioned date range for collection"
        );

        let Some((first, rest)) = windows.split_first() else {
            // The planner always yields at least one window; forwarding is
            // the safe fallback if that ever stops holding.
            return self.delegate.collect_items(request).await;
        };

        info!(window = %first, index = 1, of = windows.len(), "Collecting window");
        let derived = request.for_window(*first, request.clean, request.batch_offset);
        let mut merged = self.delegate.collect_items(&derived).await?;
        let mut batches_written = merged.batch_files.len();

        for (i, window) in rest.iter().enumerate() {
            info!(window = %window, index = i + 2, of = windows.len(), "Collecting window");
            let derived =
                request.for_window(*window, false, request.batch_offset + batches_written);
            let result = self.delegate.collect_items(&derived).await?;
            batches_written += result.batch_files.len();
            merged.absorb(result);
        }

        info!(
            repository = %request.repository,
            item_kind = %request.item_kind,
            processed = merged.processed_count,
            batch_files = merged.batch_files.len(),
            "Windowed collection complete"
        );
        Ok(merged)
    }
}
