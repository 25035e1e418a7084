//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the HTTP client with the identifying user agent
//! - Rotating through configured user agents
//! - Error classification

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Not an HTML page: {0}")]
    ContentMismatch(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// A successfully fetched page body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Where the body actually came from, after redirects
    ///
    /// Relative links on the page resolve against this URL, not the one
    /// that was requested.
    pub final_url: Url,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// A page served from the requested URL without redirects
    pub fn new(url: Url, body: Vec<u8>) -> Self {
        Self {
            final_url: url,
            body,
        }
    }
}

/// Retrieves the raw body of a page
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// The client identifies itself as `Name/Version (+ContactURL; ContactEmail)`,
/// follows at most 10 redirects and accepts gzip and brotli bodies.
///
/// # Example
///
/// ```no_run
/// use sumi_spider::config::UserAgentConfig;
/// use sumi_spider::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiSpider".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
///     rotate: Vec::new(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by `reqwest`
///
/// Only successful HTML responses are returned. A missing `Content-Type`
/// header is given the benefit of the doubt.
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?, config.rotate.clone()))
    }

    /// Wraps an existing client; `user_agents` are used round-robin when non-empty
    pub fn with_client(client: Client, user_agents: Vec<String>) -> Self {
        Self {
            client,
            user_agents,
            next_agent: AtomicUsize::new(0),
        }
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        Some(self.user_agents[index].as_str())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await?;
        let final_url = response.url().clone();
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html(content_type) {
                return Err(FetchError::ContentMismatch(content_type.to_string()));
            }
        }

        let body = response.bytes().await?;
        if final_url != *url {
            tracing::debug!("{} redirected to {}", url, final_url);
        }
        tracing::trace!("Fetched {} ({} bytes)", final_url, body.len());
        Ok(FetchedPage {
            final_url,
            body: body.to_vec(),
        })
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
