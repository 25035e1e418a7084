//! HTML parser that turns a fetched body into a [`Document`]
//!
//! Link extraction rules:
//!
//! **Include:** `<a href>` anywhere in the page and `<link rel="canonical">`
//!
//! **Exclude:** `<a download>`, fragment-only hrefs, and the `javascript:`,
//! `mailto:`, `tel:` and `data:` schemes. Stylesheets, scripts and images are
//! never considered.
//!
//! `rel="nofollow"` links are followed.

use crate::spider::Document;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// Why a fetched body could not become a document
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty response body")]
    Empty,

    #[error("Body of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Parser aborted: {0}")]
    Aborted(String),
}

/// Turns raw page bytes into a [`Document`]
///
/// Implementations must be pure: the same input always yields the same
/// document or the same error.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, url: &Url, body: &[u8]) -> Result<Document, ParseError>;
}

/// The default parser, built on `scraper`
#[derive(Debug, Clone)]
pub struct HtmlParser {
    max_bytes: usize,
}

impl HtmlParser {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl DocumentParser for HtmlParser {
    fn parse(&self, url: &Url, body: &[u8]) -> Result<Document, ParseError> {
        if body.is_empty() {
            return Err(ParseError::Empty);
        }
        if body.len() > self.max_bytes {
            return Err(ParseError::TooLarge {
                size: body.len(),
                limit: self.max_bytes,
            });
        }

        let source = String::from_utf8_lossy(body).into_owned();
        let html = Html::parse_document(&source);
        let title = extract_title(&html);
        let links = extract_links(&html, url);

        Ok(Document::new(url.clone(), source, title, links))
    }
}

fn extract_title(html: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;

    html.select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(html: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(anchors) = Selector::parse("a[href]") {
        for element in html.select(&anchors) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(link);
            }
        }
    }

    if let Ok(canonical) = Selector::parse("link[rel='canonical'][href]") {
        links.extend(
            html.select(&canonical)
                .filter_map(|element| element.value().attr("href"))
                .filter_map(|href| resolve_link(href, base_url)),
        );
    }

    links
}

/// Resolves `href` against the page URL, or `None` if it is not followable
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    const SKIPPED_SCHEMES: [&str; 4] = ["javascript:", "mailto:", "tel:", "data:"];

    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
}
