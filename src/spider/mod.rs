//! Spider module: pluggable link extraction
//!
//! A spider maps a parsed page to the links it wants crawled next. A
//! middleware wraps a spider and yields a new spider with the same contract,
//! so cross-cutting policies (host allow-lists, link filters, logging) are
//! layered on without touching the terminal spider.
//!
//! Middlewares compose outermost-first: given `[A, B]` around `T`, a call
//! enters `A`, then `B`, then `T`.

mod builtin;
mod document;

pub use builtin::{HostFilter, LinkFilter, LinkSpider};
pub use document::Document;

use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors a spider may report for a single page
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Extraction failed in {spider}: {message}")]
    Extraction { spider: String, message: String },

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Spider aborted: {0}")]
    Aborted(String),
}

/// Links discovered on a page, or the reason extraction failed
///
/// `Ok(vec![])` means "not interested": no links, not a failure.
pub type SpiderResult = Result<Vec<String>, SpiderError>;

/// An extraction policy over a parsed page
///
/// Spiders never mutate the document; the same `Document` is handed to every
/// registered chain, possibly at the same time.
pub trait Spider: Send + Sync {
    /// Identifies the spider in logs
    fn name(&self) -> &str {
        "spider"
    }

    fn parse(&self, url: &Url, document: &Document) -> SpiderResult;
}

/// Shared handle to a spider
pub type BoxedSpider = Arc<dyn Spider>;

/// A transform from one spider to another
pub trait Middleware: Send + Sync {
    fn wrap(&self, inner: BoxedSpider) -> BoxedSpider;
}

impl<F> Middleware for F
where
    F: Fn(BoxedSpider) -> BoxedSpider + Send + Sync,
{
    fn wrap(&self, inner: BoxedSpider) -> BoxedSpider {
        self(inner)
    }
}

/// Owned middleware, as passed to `Crawler::register_spider`
pub type BoxedMiddleware = Box<dyn Middleware>;

/// Folds `middlewares` right-to-left over `spider`
///
/// The first middleware ends up outermost and observes each call first.
pub fn compose(spider: BoxedSpider, middlewares: &[BoxedMiddleware]) -> BoxedSpider {
    middlewares
        .iter()
        .rev()
        .fold(spider, |inner, middleware| middleware.wrap(inner))
}

/// A spider built from a closure
pub struct FnSpider<F> {
    name: String,
    f: F,
}

impl<F> Spider for FnSpider<F>
where
    F: Fn(&Url, &Document) -> SpiderResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, url: &Url, document: &Document) -> SpiderResult {
        (self.f)(url, document)
    }
}

/// Wraps a closure as a named spider
///
/// # Example
///
/// ```
/// use sumi_spider::spider::{spider_fn, Document, Spider};
/// use url::Url;
///
/// let spider = spider_fn("next-page", |_url: &Url, doc: &Document| {
///     Ok(doc.links().iter().filter(|l| l.contains("page=")).cloned().collect())
/// });
/// assert_eq!(spider.name(), "next-page");
/// ```
pub fn spider_fn<F>(name: impl Into<String>, f: F) -> FnSpider<F>
where
    F: Fn(&Url, &Document) -> SpiderResult + Send + Sync,
{
    FnSpider {
        name: name.into(),
        f,
    }
}
