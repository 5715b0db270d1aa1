//! Adaptive time-window planning
//!
//! The search API serves at most [`crate::config::MAX_RESULTS_PER_QUERY`]
//! results per query, so a date range expected to exceed the cap must be
//! split before collection. [`WindowPlanner`] bisects a range on the
//! day-count midpoint until every window's expected count fits, producing a
//! contiguous chronological partition of the original range.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use super::CollectionRequest;

/// Half-open date interval `[start, end)` at day granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First day covered by the window
    pub start: NaiveDate,
    /// First day past the window
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Create a window spanning `[start, end)`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of days the window spans
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Last day inside the window (the day before `end`)
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.start)
    }

    /// Day-count midpoint rounded toward `start`.
    ///
    /// `None` when the window spans fewer than two days and cannot be
    /// subdivided further.
    pub fn midpoint(&self) -> Option<NaiveDate> {
        let days = self.num_days();
        if days < 2 {
            return None;
        }
        self.start.checked_add_days(Days::new((days / 2) as u64))
    }

    /// Split the window at its midpoint into two contiguous halves
    pub fn bisect(&self) -> Option<(TimeWindow, TimeWindow)> {
        let mid = self.midpoint()?;
        Some((
            TimeWindow::new(self.start, mid),
            TimeWindow::new(mid, self.end),
        ))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Count oracle bound to a request's filters.
///
/// Implementations return the number of items matching the request inside
/// `window`, or a negative value when the count could not be obtained.
#[async_trait]
pub trait SearchCounter: Send + Sync {
    /// Expected result count for `request` restricted to `window`;
    /// negative on upstream failure
    async fn count(&self, request: &CollectionRequest, window: TimeWindow) -> i64;
}

/// Plans a contiguous partition of a date range whose windows each fit
/// under the per-query result cap
#[derive(Debug, Clone, Copy)]
pub struct WindowPlanner {
    max_per_window: u64,
}

impl WindowPlanner {
    /// Create a planner with the given per-window result cap
    pub fn new(max_per_window: u64) -> Self {
        Self { max_per_window }
    }

    /// The per-window result cap
    pub fn max_per_window(&self) -> u64 {
        self.max_per_window
    }

    /// Partition `range` so every window's expected count fits under the cap.
    ///
    /// A count at or under the cap keeps the window whole. A negative count
    /// (the oracle's error sentinel) is treated as fitting: progress is
    /// preferred over strictness, and the decision is logged so a masked
    /// upstream failure stays visible. A window already at one-day
    /// granularity that still exceeds the cap is kept as a single oversized
    /// window rather than recursing forever.
    ///
    /// The returned windows are contiguous, chronological, and cover
    /// `range` exactly.
    pub async fn plan(
        &self,
        range: TimeWindow,
        request: &CollectionRequest,
        counter: &dyn SearchCounter,
    ) -> Vec<TimeWindow> {
        let mut planned = Vec::new();
        // Work stack instead of recursion; depth stays within
        // log2(range days) because each split halves the span.
        let mut pending = vec![range];

        while let Some(window) = pending.pop() {
            let count = counter.count(request, window).await;
            debug!(window = %window, count = count, "Probed window");

            if count < 0 {
                warn!(
                    window = %window,
                    "Count probe failed; assuming the window fits to keep making progress"
                );
                planned.push(window);
                continue;
            }

            if count as u64 <= self.max_per_window {
                planned.push(window);
                continue;
            }

            match window.bisect() {
                Some((left, right)) => {
                    debug!(window = %window, left = %left, right = %right, "Splitting window");
                    // Left half on top so output stays chronological
                    pending.push(right);
                    pending.push(left);
                }
                None => {
                    warn!(
                        window = %window,
                        count = count,
                        cap = self.max_per_window,
                        "Window at minimum granularity still exceeds the cap; keeping it oversized"
                    );
                    planned.push(window);
                }
            }
        }

        planned
    }
}
