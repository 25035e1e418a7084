//! Ready-made spiders and middlewares

use crate::spider::{BoxedSpider, Document, Middleware, Spider, SpiderResult};
use crate::url::{extract_domain, host_allowed, HostPattern};
use std::sync::Arc;
use url::Url;

/// Terminal spider that follows every link on the page
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkSpider;

impl Spider for LinkSpider {
    fn name(&self) -> &str {
        "links"
    }

    fn parse(&self, _url: &Url, document: &Document) -> SpiderResult {
        Ok(document.links().to_vec())
    }
}

/// Middleware that ignores pages outside an allow-list of hosts
///
/// The host is taken from the document, so a page redirected off the list
/// is skipped too. Pages on other hosts produce no links and no error.
#[derive(Debug, Clone)]
pub struct HostFilter {
    patterns: Arc<[HostPattern]>,
}

impl HostFilter {
    pub fn new(patterns: Vec<HostPattern>) -> Self {
        Self {
            patterns: patterns.into(),
        }
    }
}

impl Middleware for HostFilter {
    fn wrap(&self, inner: BoxedSpider) -> BoxedSpider {
        Arc::new(HostFiltered {
            patterns: Arc::clone(&self.patterns),
            inner,
        })
    }
}

struct HostFiltered {
    patterns: Arc<[HostPattern]>,
    inner: BoxedSpider,
}

impl Spider for HostFiltered {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn parse(&self, url: &Url, document: &Document) -> SpiderResult {
        match extract_domain(document.url()) {
            Some(host) if host_allowed(&self.patterns, &host) => self.inner.parse(url, document),
            _ => {
                tracing::trace!("Host filter skipped {}", document.url());
                Ok(Vec::new())
            }
        }
    }
}

/// Middleware that drops discovered links pointing outside an allow-list
#[derive(Debug, Clone)]
pub struct LinkFilter {
    patterns: Arc<[HostPattern]>,
}

impl LinkFilter {
    pub fn new(patterns: Vec<HostPattern>) -> Self {
        Self {
            patterns: patterns.into(),
        }
    }
}

impl Middleware for LinkFilter {
    fn wrap(&self, inner: BoxedSpider) -> BoxedSpider {
        Arc::new(LinkFiltered {
            patterns: Arc::clone(&self.patterns),
            inner,
        })
    }
}

struct LinkFiltered {
    patterns: Arc<[HostPattern]>,
    inner: BoxedSpider,
}

impl Spider for LinkFiltered {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn parse(&self, url: &Url, document: &Document) -> SpiderResult {
        let links = self.inner.parse(url, document)?;
        Ok(links
            .into_iter()
            .filter(|link| {
                Url::parse(link)
                    .ok()
                    .and_then(|u| extract_domain(&u))
                    .is_some_and(|host| host_allowed(&self.patterns, &host))
            })
            .collect())
    }
}
