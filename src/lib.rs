//! Sumi-Spider: a polite, resumable web crawler
//!
//! This crate drives a crawl from seed URLs through a deduplicating,
//! crash-recoverable frontier. Pages are fetched by a bounded worker pool and
//! handed to pluggable spider chains, whose discovered links are fed back into
//! the frontier.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod spider;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Spider operations
///
/// Component failures surface through their own enums; a crawl itself only
/// fails before it starts.
#[derive(Debug, Error)]
pub enum SumiError {
    #[error("already running")]
    AlreadyRunning,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Spider operations
pub type Result<T> = std::result::Result<T, SumiError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlPhase, CrawlReport, Crawler, CrawlerOptions};
pub use frontier::{Frontier, MemoryFrontier, SqliteFrontier};
pub use spider::{Document, Middleware, Spider, SpiderError};
pub use state::UrlState;
pub use crate::url::{extract_domain, normalize_url};
