//! Utility functions shared by the fetch layers.
//!
//! - **URL policy**: SSRF-focused validation applied before every outbound request
//! - **URL helpers**: origin derivation and relative reference resolution
//! - **Text**: control-character stripping for feed titles that reach the terminal

mod text;
mod url_policy;

pub use text::clean_title;
pub use url_policy::{origin_of, resolve_url, validate_url, UrlPolicy, UrlValidationError};
