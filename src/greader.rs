//! Subscribing feeds on a Google Reader compatible service (FreshRSS, Miniflux, ...).
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Insecure endpoint: HTTPS required (except localhost for testing)")]
    InsecureEndpoint,
}

/// Client for the `subscription/edit` endpoint of a Google Reader API.
pub struct GReaderClient {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: SecretString,
}

impl std::fmt::Debug for GReaderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GReaderClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GReaderClient {
    /// SEC-002: The API key travels in a header, so the endpoint must be HTTPS.
    /// Plain HTTP is accepted only for localhost/127.0.0.1.
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        api_key: SecretString,
    ) -> Result<Self, SubscribeError> {
        let endpoint = url::Url::parse(endpoint)?;

        if endpoint.scheme() != "https" {
            let is_localhost = endpoint.scheme() == "http"
                && matches!(endpoint.host_str(), Some("localhost" | "127.0.0.1"));
            if !is_localhost {
                tracing::error!(endpoint = %endpoint, "Rejecting non-HTTPS subscription endpoint");
                return Err(SubscribeError::InsecureEndpoint);
            }
            tracing::warn!(endpoint = %endpoint, "Using non-HTTPS subscription endpoint (localhost only)");
        }

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Subscribes `feed_url` under the label `category`.
    ///
    /// Sends `ac=subscribe`, `s=feed/<url>`, `a=user/-/label/<category>` as a
    /// form body. Any non-2xx response is an error; nothing is retried, and
    /// whether a duplicate subscription is harmless is up to the server.
    pub async fn subscribe(&self, feed_url: &str, category: &str) -> Result<(), SubscribeError> {
        let stream = format!("feed/{feed_url}");
        let label = format!("user/-/label/{category}");
        let form = [
            ("ac", "subscribe"),
            ("s", stream.as_str()),
            ("a", label.as_str()),
        ];

        let request = self
            .client
            .post(self.endpoint.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer auth={}", self.api_key.expose_secret()),
            )
            .form(&form);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| SubscribeError::Timeout)?
            .map_err(SubscribeError::Network)?;

        if !response.status().is_success() {
            tracing::warn!(
                feed = %feed_url,
                status = response.status().as_u16(),
                "Subscription rejected"
            );
            return Err(SubscribeError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(feed = %feed_url, category = %category, "Subscribed");
        Ok(())
    }
}
