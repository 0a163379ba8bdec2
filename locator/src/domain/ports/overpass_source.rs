//! Driven port for posting queries to an Overpass mirror.
//!
//! The domain chooses the endpoint (round-robin) and owns the retry loop, so
//! adapters only perform one request and classify its outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by a single Overpass request.
    pub enum OverpassSourceError {
        /// Network transport failed before a response arrived.
        Transport { message: String } =>
            "overpass transport failed: {message}",
        /// The request exceeded the client-side timeout.
        Timeout { message: String } =>
            "overpass timeout: {message}",
        /// The mirror answered 429.
        RateLimited { retry_after: Option<Duration> } =>
            "overpass rate limited request (retry after {retry_after:?})",
        /// The mirror answered 502 or 504.
        GatewayUnavailable { status: u16, retry_after: Option<Duration> } =>
            "overpass gateway unavailable: status {status}",
        /// The response body was not valid JSON.
        Decode { message: String } =>
            "overpass response decode failed: {message}",
        /// Any other non-success status.
        Rejected { status: u16, message: String } =>
            "overpass rejected request with status {status}: {message}",
    }
}

impl OverpassSourceError {
    /// Return whether retrying this error against another attempt may help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Minimum wait requested by the server through `Retry-After`, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::GatewayUnavailable { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }
}

/// Port for posting one Overpass query to one endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverpassSource: Send + Sync {
    /// Post `query` to `endpoint` and return the decoded JSON document.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let endpoint = url::Url::parse("https://overpass-api.de/api/interpreter")?;
    /// let document = source.post_query(&endpoint, "[out:json];node(1);out;").await?;
    /// assert!(document.get("elements").is_some());
    /// ```
    async fn post_query(&self, endpoint: &Url, query: &str)
    -> Result<Value, OverpassSourceError>;
}
