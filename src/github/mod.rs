//! GitHub API transport layer
//!
//! The transport seam is split in two: a raw [`Transport`] that issues
//! single HTTP calls and surfaces classified [`ApiError`]s, and the
//! [`retry::RetryingClient`] decorator that adds pacing, backoff and
//! reset-aware waiting on top of any transport.

use async_trait::async_trait;
use serde_json::Value;

pub mod retry;
pub mod transport;

pub use retry::{RetryConfig, RetryingClient};
pub use transport::HttpTransport;

/// Result type for transport operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Classified API failure (T-taxonomy shared by transport and retry layers)
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Server-side fault (5xx); retryable with exponential backoff
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Quota exhaustion (429, or 403 with zero remaining); retryable once
    /// the reported reset passes
    #[error("rate limited: {message}")]
    RateLimited {
        /// Server-reported Unix timestamp at which the quota refills
        reset_epoch: Option<i64>,
        /// Response body excerpt
        message: String,
    },

    /// Any other 4xx; fatal, never retried
    #[error("client error {status}: {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Network-level failure before a status was obtained; retryable with
    /// exponential backoff
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Classify an HTTP failure status into the fault taxonomy.
    ///
    /// A 403 counts as rate limiting only when the response headers show
    /// zero remaining quota; otherwise it is an ordinary client fault.
    pub fn from_status(
        status: u16,
        message: String,
        rate_limit_remaining: Option<u64>,
        reset_epoch: Option<i64>,
    ) -> Self {
        match status {
            429 => ApiError::RateLimited {
                reset_epoch,
                message,
            },
            403 if rate_limit_remaining == Some(0) => ApiError::RateLimited {
                reset_epoch,
                message,
            },
            s if (500..600).contains(&s) => ApiError::Server { status: s, message },
            s => ApiError::Client { status: s, message },
        }
    }

    /// Whether the retry layer may re-issue the failed call
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiError::Client { .. })
    }
}

/// Most recent rate-limit snapshot reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Total quota per window
    pub limit: u64,
    /// Calls remaining in the current window
    pub remaining: u64,
    /// Unix timestamp at which the quota refills
    pub reset_epoch: i64,
    /// Calls consumed in the current window
    pub used: u64,
}

/// Raw HTTP transport for the GitHub API.
///
/// Implementations issue exactly one HTTP call per method and never retry;
/// resilience is layered on by [`RetryingClient`]. Only idempotent read
/// calls belong here.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request against an API path (e.g. `repos/owner/name`)
    async fn get(&self, path: &str) -> ApiResult<Value>;

    /// Issue a GET request with query parameters
    async fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Value>;

    /// Issue a GraphQL POST with the given request payload
    async fn post_graphql(&self, payload: &Value) -> ApiResult<Value>;

    /// The most recent rate-limit snapshot, if any response carried one
    fn last_rate_limit(&self) -> Option<RateLimitInfo>;
}
