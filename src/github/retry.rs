//! Rate-limit aware retrying transport decorator
//!
//! Wraps any [`Transport`] and adds, per call:
//!
//! 1. **Pacing** - when the remaining quota drops below a threshold, the
//!    client sleeps long enough to spread the remaining calls evenly across
//!    the time left until the server-reported reset.
//! 2. **Classified retries** - server and network faults back off
//!    exponentially, rate-limit faults wait out the reported reset, client
//!    faults propagate unmodified after a single attempt.
//!
//! The decorator holds the most recent [`RateLimitInfo`] as per-instance
//! state; independent clients never share it.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{
    calculate_backoff, MAX_RETRIES, PACING_THRESHOLD, RATE_LIMIT_BACKOFF_MS,
};

use super::{ApiError, ApiResult, RateLimitInfo, Transport};

/// Retry behavior configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt; zero means
    /// exactly one attempt
    pub max_retries: u32,
    /// Wait applied to a rate-limit fault whose reset is absent or already
    /// past, and the floor for reset-aware waits
    pub rate_limit_backoff: Duration,
    /// Remaining-quota level below which pacing kicks in
    pub pacing_threshold: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            rate_limit_backoff: Duration::from_millis(RATE_LIMIT_BACKOFF_MS),
            pacing_threshold: PACING_THRESHOLD,
        }
    }
}

impl RetryConfig {
    /// Override the maximum number of retries
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// One pending call, re-dispatchable across attempts
enum Call<'a> {
    Get(&'a str),
    GetWithQuery(&'a str, &'a [(&'a str, String)]),
    PostGraphQl(&'a Value),
}

impl Call<'_> {
    fn describe(&self) -> &str {
        match self {
            Call::Get(path) | Call::GetWithQuery(path, _) => path,
            Call::PostGraphQl(_) => "graphql",
        }
    }
}

/// Transport decorator adding pacing, backoff and reset-aware retries
pub struct RetryingClient<T: Transport> {
    transport: T,
    config: RetryConfig,
    last_rate_limit: Mutex<Option<RateLimitInfo>>,
}

impl<T: Transport> RetryingClient<T> {
    /// Wrap a transport with the default retry configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RetryConfig::default())
    }

    /// Wrap a transport with a custom retry configuration
    pub fn with_config(transport: T, config: RetryConfig) -> Self {
        Self {
            transport,
            config,
            last_rate_limit: Mutex::new(None),
        }
    }

    /// Access the wrapped transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn snapshot(&self) -> Option<RateLimitInfo> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Pull the transport's latest snapshot into this instance.
    /// A call that produced no headers (e.g. a network fault) keeps the
    /// previous snapshot.
    fn refresh_snapshot(&self) {
        if let Some(info) = self.transport.last_rate_limit() {
            let mut guard = self
                .last_rate_limit
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *guard = Some(info);
        }
    }

    /// Sleep before issuing a request when the remaining quota is low
    async fn pace(&self) {
        let Some(info) = self.snapshot() else { return };
        let now = Utc::now().timestamp();
        if let Some(delay) = pacing_delay(&info, now, self.config.pacing_threshold) {
            debug!(
                remaining = info.remaining,
                reset_epoch = info.reset_epoch,
                delay_ms = delay.as_millis() as u64,
                "Pacing request against remaining quota"
            );
            sleep(delay).await;
        }
    }

    async fn dispatch(&self, call: &Call<'_>) -> ApiResult<Value> {
        match call {
            Call::Get(path) => self.transport.get(path).await,
            Call::GetWithQuery(path, query) => self.transport.get_with_query(path, query).await,
            Call::PostGraphQl(payload) => self.transport.post_graphql(payload).await,
        }
    }

    fn retry_delay(&self, err: &ApiError, attempt: u32) -> Duration {
        match err {
            ApiError::RateLimited { reset_epoch, .. } => rate_limit_delay(
                *reset_epoch,
                Utc::now().timestamp(),
                self.config.rate_limit_backoff,
            ),
            _ => calculate_backoff(attempt - 1),
        }
    }

    async fn execute(&self, call: Call<'_>) -> ApiResult<Value> {
        let mut attempts: u32 = 0;

        loop {
            self.pace().await;
            let result = self.dispatch(&call).await;
            self.refresh_snapshot();

            let err = match result {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(call = call.describe(), error = %err, "Fatal client fault, not retrying");
                return Err(err);
            }

            attempts += 1;
            if attempts > self.config.max_retries {
                warn!(
                    call = call.describe(),
                    attempts = attempts,
                    "Retries exhausted"
                );
                return Err(err);
            }

            let delay = self.retry_delay(&err, attempts);
            warn!(
                call = call.describe(),
                attempt = attempts,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after fault"
            );
            sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for RetryingClient<T> {
    async fn get(&self, path: &str) -> ApiResult<Value> {
        self.execute(Call::Get(path)).await
    }

    async fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Value> {
        self.execute(Call::GetWithQuery(path, query)).await
    }

    async fn post_graphql(&self, payload: &Value) -> ApiResult<Value> {
        self.execute(Call::PostGraphQl(payload)).await
    }

    fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        self.snapshot()
    }
}

/// Delay that spreads the remaining quota evenly to the reset boundary.
///
/// Returns `None` when pacing does not apply: no quota pressure, an
/// exhausted window (the rate-limit retry path owns that case), or a reset
/// already in the past.
fn pacing_delay(info: &RateLimitInfo, now: i64, threshold: u64) -> Option<Duration> {
    if info.remaining == 0 || info.remaining >= threshold {
        return None;
    }
    let until_reset = info.reset_epoch - now;
    if until_reset <= 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        until_reset as f64 / info.remaining as f64,
    ))
}

/// Wait for a rate-limit fault: one second past the reported reset, floored
/// at `fallback`; just `fallback` when the reset is absent or already past.
fn rate_limit_delay(reset_epoch: Option<i64>, now: i64, fallback: Duration) -> Duration {
    match reset_epoch {
        Some(reset) if reset > now => fallback.max(Duration::from_secs((reset - now + 1) as u64)),
        _ => fallback,
    }
}
