use crate::util::{UrlPolicy, UrlValidationError};
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!("blogroll-rank/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching a feed, HTML page or blogroll.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL was rejected before any request was made (SSRF policy, bad scheme)
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the 5MB size limit
    #[error("response too large")]
    TooLarge,
}

/// Why a redirect hop was refused.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("too many redirects (max {})", MAX_REDIRECTS)]
    TooMany,
    #[error("redirect loop detected")]
    Loop,
    #[error("redirect target refused: {0}")]
    Blocked(#[from] UrlValidationError),
}

/// Builds the HTTP client used for crawling.
///
/// Redirects are followed at most 5 hops, never in a loop, and only while
/// every hop passes `policy`, the same check [`Fetcher::get`] applies to the
/// URL it is given.
pub fn crawl_client(policy: UrlPolicy) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect_policy(policy))
        .build()
}

fn redirect_policy(policy: UrlPolicy) -> Policy {
    Policy::custom(move |attempt| {
        if let Err(e) = check_redirect(policy, attempt.url(), attempt.previous()) {
            tracing::warn!(to = %attempt.url(), error = %e, "Refusing redirect");
            return attempt.error(e);
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %attempt.url(),
            hop = attempt.previous().len(),
            "Following redirect"
        );
        attempt.follow()
    })
}

/// `previous` holds every URL already requested, the original one first.
fn check_redirect(policy: UrlPolicy, next: &Url, previous: &[Url]) -> Result<(), RedirectError> {
    if previous.len() > MAX_REDIRECTS {
        return Err(RedirectError::TooMany);
    }
    if previous.iter().any(|prev| prev == next) {
        return Err(RedirectError::Loop);
    }
    policy.check(next.as_str())?;
    Ok(())
}

/// Shared HTTP GET used by feed resolution, HTML discovery and blogroll loading.
///
/// Every request is checked against the [`UrlPolicy`], bounded by a timeout,
/// and its body is streamed with a size cap. There is no retry: callers decide
/// whether a failure means "absent" or aborts the crawl.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: UrlPolicy,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, policy: UrlPolicy, timeout: Duration) -> Self {
        Self {
            client,
            policy,
            timeout,
        }
    }

    /// Fetches `url` and returns the response body.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let validated = self.policy.check(url)?;

        let response = tokio::time::timeout(self.timeout, self.client.get(validated).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        tokio::time::timeout(self.timeout, read_limited_bytes(response))
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

/// Reads a response body, failing once it grows past the size limit.
async fn read_limited_bytes(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE as u64 {
            return Err(FetchError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > MAX_RESPONSE_SIZE {
            return Err(FetchError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
