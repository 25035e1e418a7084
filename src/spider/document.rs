use crate::spider::SpiderError;
use scraper::{Html, Selector};
use url::Url;

/// A fetched and parsed page
///
/// The document is immutable and `Send + Sync`, so every spider chain can
/// read the same instance concurrently. Spiders that need their own DOM
/// queries get a private parsed view from [`Document::html`].
#[derive(Debug, Clone)]
pub struct Document {
    url: Url,
    source: String,
    title: Option<String>,
    links: Vec<String>,
}

impl Document {
    pub fn new(url: Url, source: String, title: Option<String>, links: Vec<String>) -> Self {
        Self {
            url,
            source,
            title,
            links,
        }
    }

    /// The URL the page was fetched from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The decoded page source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The page `<title>`, if any
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Followable absolute links found on the page, in document order
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Parses the source into a fresh DOM owned by the caller
    pub fn html(&self) -> Html {
        Html::parse_document(&self.source)
    }

    /// Collects `attr` from every element matching `selector`, resolved
    /// against the page URL
    ///
    /// Values that do not resolve to an http(s) URL are skipped.
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_spider::spider::Document;
    /// use url::Url;
    ///
    /// let url = Url::parse("https://example.com/list").unwrap();
    /// let html = r#"<a class="next" href="?page=2">Next</a><a href="/about">About</a>"#;
    /// let doc = Document::new(url.clone(), html.to_string(), None, vec![]);
    ///
    /// let next = doc.select_urls("a.next", "href").unwrap();
    /// assert_eq!(next, vec!["https://example.com/list?page=2".to_string()]);
    /// ```
    pub fn select_urls(&self, selector: &str, attr: &str) -> Result<Vec<String>, SpiderError> {
        let selector =
            Selector::parse(selector).map_err(|_| SpiderError::Selector(selector.to_string()))?;
        let html = self.html();

        Ok(html
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .filter_map(|value| self.url.join(value.trim()).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(|url| url.to_string())
            .collect())
    }
}
