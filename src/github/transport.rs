//! HTTP transport over reqwest
//!
//! One method call equals one HTTP request. Every response's
//! `X-RateLimit-*` headers are folded into a per-instance snapshot that the
//! retry layer reads for pacing.

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{ApiError, ApiResult, RateLimitInfo, Transport};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// REST API version pin sent with every request
const API_VERSION: &str = "2022-11-28";

/// Concrete GitHub transport backed by a shared reqwest client
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
    last_rate_limit: Mutex<Option<RateLimitInfo>>,
}

impl HttpTransport {
    /// Create a transport against the public GitHub API
    pub fn new(token: impl Into<String>) -> ApiResult<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create a transport against a custom API root (e.g. GitHub Enterprise)
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("github-data-collector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            last_rate_limit: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fold response headers into the rate-limit snapshot, returning the
    /// parsed info so error classification can reuse it.
    fn record_rate_limit(&self, headers: &HeaderMap) -> Option<RateLimitInfo> {
        let info = parse_rate_limit_headers(headers)?;
        debug!(
            remaining = info.remaining,
            limit = info.limit,
            reset_epoch = info.reset_epoch,
            "Rate limit snapshot updated"
        );
        let mut guard = self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(info);
        Some(info)
    }

    /// Execute a prepared request and map the response into a JSON body or
    /// a classified [`ApiError`].
    async fn execute(&self, request: reqwest::RequestBuilder) -> ApiResult<Value> {
        let response = request
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let info = self.record_rate_limit(response.headers());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<unreadable body>"));
            let message = body.chars().take(512).collect::<String>();
            warn!(status = status.as_u16(), "API request failed");
            return Err(ApiError::from_status(
                status.as_u16(),
                message,
                info.map(|i| i.remaining),
                info.map(|i| i.reset_epoch),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to decode response body: {e}")))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> ApiResult<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.execute(self.client.get(&url)).await
    }

    async fn get_with_query(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Value> {
        let url = self.url(path);
        debug!(%url, params = query.len(), "GET");
        self.execute(self.client.get(&url).query(query)).await
    }

    async fn post_graphql(&self, payload: &Value) -> ApiResult<Value> {
        let url = self.url("graphql");
        debug!(%url, "POST");
        self.execute(self.client.post(&url).json(payload)).await
    }

    fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse the `X-RateLimit-*` header family.
///
/// `remaining` and `reset` must both be present for a snapshot to be
/// recorded; `limit` and `used` default to zero when absent.
fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header_u64 = |name: &str| -> Option<u64> {
        headers.get(name)?.to_str().ok()?.parse::<u64>().ok()
    };
    let header_i64 = |name: &str| -> Option<i64> {
        headers.get(name)?.to_str().ok()?.parse::<i64>().ok()
    };

    let remaining = header_u64("X-RateLimit-Remaining")?;
    let reset_epoch = header_i64("X-RateLimit-Reset")?;

    Some(RateLimitInfo {
        limit: header_u64("X-RateLimit-Limit").unwrap_or(0),
        remaining,
        reset_epoch,
        used: header_u64("X-RateLimit-Used").unwrap_or(0),
    })
}
