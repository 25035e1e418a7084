//! Crawler module for fetching pages and driving the crawl
//!
//! This module contains the core crawling logic:
//! - HTTP fetching behind the [`Fetcher`] trait
//! - HTML parsing behind the [`DocumentParser`] trait
//! - The fetch worker pool
//! - Politeness delays
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod report;
mod scheduler;

pub use coordinator::{CrawlPhase, Crawler, CrawlerOptions};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use parser::{DocumentParser, HtmlParser, ParseError};
pub use pool::{FetchPool, PageError, PageResult};
pub use report::CrawlReport;
pub use scheduler::Politeness;
