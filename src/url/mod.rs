//! URL handling module for Sumi-Spider
//!
//! This module provides URL normalization (the frontier's dedup key), host
//! extraction and host pattern matching for allow-lists.

mod normalize;
mod patterns;

use url::Url;

pub use normalize::normalize_url;
pub use patterns::HostPattern;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::extract_domain;
///
/// let url = Url::parse("https://Sub.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `host` matches at least one of `patterns`
pub fn host_allowed(patterns: &[HostPattern], host: &str) -> bool {
    patterns.iter().any(|p| p.matches(host))
}
