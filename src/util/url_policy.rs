use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which hosts the crawler is willing to contact.
///
/// Blogrolls are third-party documents, so by default every URL they name is
/// checked with [`validate_url`] before it is fetched. `allow_private_hosts`
/// relaxes the localhost/private-range check (self-hosted setups, tests) but
/// still requires an http(s) URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    pub fn check(&self, url_str: &str) -> Result<Url, UrlValidationError> {
        if !self.allow_private_hosts {
            return validate_url(url_str);
        }

        let url = Url::parse(url_str)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        }
    }
}

/// Validates a URL string for use as a fetch target.
///
/// Rejects non-HTTP(S) schemes, localhost, and private IP ranges
/// (RFC 1918, link-local, unique local IPv6).
///
/// # Examples
///
/// ```
/// use blogroll_rank::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::Localhost);
        }

        // Strip brackets from IPv6 addresses for parsing
        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

/// Scheme, host and port of `url` (`https://example.com:8443`), without a path.
///
/// Returns `None` for opaque origins (`data:`, `file:` and the like).
pub fn origin_of(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

/// Resolves a possibly relative reference against a base URL.
///
/// Absolute `http(s)` references are returned unchanged. If the base cannot
/// be parsed or the join fails, the reference is returned as-is and the
/// fetch layer rejects it later.
pub fn resolve_url(href: &str, base_url: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_owned(),
    }
}
