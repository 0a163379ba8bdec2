//! Reqwest-backed Overpass source adapter.
//!
//! This adapter owns transport details only: form encoding, the client
//! timeout, status classification with `Retry-After` parsing, and JSON
//! decoding. Endpoint choice and retries belong to the domain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::domain::ports::{OverpassSource, OverpassSourceError};

/// Default client-side request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("stop-locator/", env!("CARGO_PKG_VERSION"));

/// Overpass adapter issuing form-encoded POST requests.
pub struct OverpassHttpSource {
    client: Client,
    user_agent: String,
}

impl OverpassHttpSource {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_user_agent(timeout, DEFAULT_USER_AGENT)
    }

    /// Build an adapter sending `user_agent` on every request.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_user_agent(
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

#[async_trait]
impl OverpassSource for OverpassHttpSource {
    async fn post_query(&self, endpoint: &Url, query: &str) -> Result<Value, OverpassSourceError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(%endpoint, status = status.as_u16(), bytes = body.len(), "overpass response");
        if !status.is_success() {
            return Err(map_status_error(status, retry_after, body.as_ref()));
        }

        serde_json::from_slice(body.as_ref()).map_err(|error| {
            OverpassSourceError::decode(format!("invalid Overpass JSON payload: {error}"))
        })
    }
}

/// `Retry-After` as whole seconds; HTTP-date forms are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_transport_error(error: reqwest::Error) -> OverpassSourceError {
    if error.is_timeout() {
        OverpassSourceError::timeout(error.to_string())
    } else {
        OverpassSourceError::transport(error.to_string())
    }
}

fn map_status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &[u8],
) -> OverpassSourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => OverpassSourceError::rate_limited(retry_after),
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            OverpassSourceError::gateway_unavailable(status.as_u16(), retry_after)
        }
        _ => OverpassSourceError::rejected(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network Overpass mapping helpers.

    use super::*;
    use reqwest::header::HeaderValue;
    use rstest::rstest;

    fn headers(retry_after: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = retry_after {
            headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
        }
        headers
    }

    #[rstest]
    #[case::seconds(Some("5"), Some(Duration::from_secs(5)))]
    #[case::padded(Some(" 12 "), Some(Duration::from_secs(12)))]
    #[case::http_date(Some("Wed, 21 Oct 2026 07:28:00 GMT"), None)]
    #[case::negative(Some("-3"), None)]
    #[case::absent(None, None)]
    fn parses_integer_retry_after(
        #[case] raw: Option<&'static str>,
        #[case] expected: Option<Duration>,
    ) {
        assert_eq!(retry_after(&headers(raw)), expected);
    }

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, "RateLimited", true)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, "GatewayUnavailable", true)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "GatewayUnavailable", true)]
    #[case::bad_request(StatusCode::BAD_REQUEST, "Rejected", false)]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, "Rejected", false)]
    #[case::unavailable(StatusCode::SERVICE_UNAVAILABLE, "Rejected", false)]
    fn maps_http_statuses_to_expected_domain_errors(
        #[case] status: StatusCode,
        #[case] kind: &str,
        #[case] retryable: bool,
    ) {
        let error = map_status_error(status, None, b"{\"remark\":\"backend unavailable\"}");
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn retry_hint_travels_with_throttling_errors() {
        let hint = Some(Duration::from_secs(5));
        assert_eq!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, hint, b"").retry_after(),
            hint
        );
        assert_eq!(
            map_status_error(StatusCode::GATEWAY_TIMEOUT, hint, b"").retry_after(),
            hint
        );
    }

    #[test]
    fn rejected_errors_carry_a_compact_body_preview() {
        let body = format!("<html>\n  <body>{}</body>\n</html>", "x".repeat(300));
        let error = map_status_error(StatusCode::BAD_REQUEST, None, body.as_bytes());
        let OverpassSourceError::Rejected { status, message } = error else {
            panic!("400 should map to Rejected");
        };
        assert_eq!(status, 400);
        assert!(message.starts_with("<html> <body>xxx"));
        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), 163);
    }

    #[test]
    fn builds_with_custom_user_agent() {
        let source = OverpassHttpSource::with_user_agent(Duration::from_secs(1), "tester/1.0")
            .expect("client builds");
        assert_eq!(source.user_agent, "tester/1.0");
    }
}
