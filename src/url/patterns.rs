use crate::ConfigError;
use std::fmt;

/// A host allow-list pattern
///
/// Two forms are accepted:
/// 1. Exact: `example.com` matches only `example.com`
/// 2. Wildcard: `*.example.com` matches `example.com` and any subdomain of it
///
/// Hosts are expected to be normalized already. Patterns are normalized the
/// same way on parse: lowercased, with a leading `www.` removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    Exact(String),
    Subdomains(String),
}

impl HostPattern {
    /// Parses and validates a pattern
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_spider::url::HostPattern;
    ///
    /// let pattern = HostPattern::parse("*.example.com").unwrap();
    /// assert!(pattern.matches("example.com"));
    /// assert!(pattern.matches("api.v2.example.com"));
    /// assert!(!pattern.matches("example.org"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim().to_lowercase();
        match pattern.strip_prefix("*.") {
            Some(base) => {
                let base = strip_www(base);
                validate_host(base)?;
                Ok(Self::Subdomains(base.to_string()))
            }
            None => {
                let host = strip_www(&pattern);
                validate_host(host)?;
                Ok(Self::Exact(host.to_string()))
            }
        }
    }

    /// Returns true if `host` matches this pattern
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(exact) => host == exact,
            Self::Subdomains(base) => {
                host == base
                    || host
                        .strip_suffix(base.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(host) => write!(f, "{}", host),
            Self::Subdomains(base) => write!(f, "*.{}", base),
        }
    }
}

// URLs lose their `www.` during normalization, so a pattern keeping it could
// never match.
fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with(['.', '-']) || host.ends_with(['.', '-']) || host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' has a misplaced '.' or '-'",
            host
        )));
    }

    Ok(())
}
