//! Configuration file parser for `config.toml`.
//!
//! ```toml
//! [greader]
//! url = "https://reader.example.com/api/greader.php/reader/api/0/subscription/edit"
//! api_key = "..."
//!
//! [feed]
//! url = "https://example.com/feed.xml"
//!
//! [crawl]
//! max_depth = 10
//! timeout_secs = 10
//! allow_private_hosts = false
//! ```
//!
//! Every section is optional and a missing file yields `Config::default()`;
//! the command line can supply the seed feed instead. Unknown top-level keys
//! are accepted but logged as a warning.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subscription service; required only for `--subscribe`.
    pub greader: Option<GReaderConfig>,
    /// Seed feed; `--feed` overrides it.
    pub feed: Option<FeedConfig>,
    pub crawl: CrawlConfig,
}

/// `[greader]` section.
///
/// SEC-015: Custom Debug impl masks `api_key` to prevent secret leakage
/// in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
pub struct GReaderConfig {
    /// Full URL of the `subscription/edit` endpoint.
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for GReaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GReaderConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// `[feed]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url: String,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// How many blogroll hops to follow from the seed.
    pub max_depth: usize,
    /// Per-request timeout for feed, HTML and blogroll fetches.
    pub timeout_secs: u64,
    /// Allow fetching from localhost and private address ranges.
    pub allow_private_hosts: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            timeout_secs: 10,
            allow_private_hosts: false,
        }
    }
}

impl CrawlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - `timeout_secs = 0` → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["greader", "feed", "crawl"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        if config.crawl.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "crawl.timeout_secs must be at least 1".to_string(),
            ));
        }

        tracing::info!(
            path = %path.display(),
            max_depth = config.crawl.max_depth,
            greader = config.greader.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
