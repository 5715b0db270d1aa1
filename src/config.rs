//! Collection configuration constants

use std::time::Duration;

/// Maximum number of retries for failed API calls.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds for server and transport faults.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
/// Caps exponential growth (retry 5 = 32s capped to 30s).
pub const MAX_BACKOFF_MS: u64 = 30_000; // 30 seconds

/// Fallback wait in milliseconds for a rate-limit fault whose reset
/// timestamp is absent or already in the past.
pub const RATE_LIMIT_BACKOFF_MS: u64 = 60_000; // 1 minute

/// Remaining-quota threshold below which requests are paced.
/// GitHub's core quota is 5,000/hour; pacing kicks in on the last 100.
pub const PACING_THRESHOLD: u64 = 100;

/// Hard ceiling on results a single search query can return.
/// GitHub's search API serves at most 1,000 results per query regardless
/// of pagination.
pub const MAX_RESULTS_PER_QUERY: u64 = 1000;

/// Default number of items persisted per batch file.
/// 100 is the largest page size the search API serves.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Calculate exponential backoff delay for a retry attempt (0-indexed)
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
