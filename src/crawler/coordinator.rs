//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator seeds and repairs the frontier, keeps the fetch pool busy,
//! offers every fetched document to each registered spider chain and records
//! one terminal state per page.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::DocumentParser;
use crate::crawler::pool::{FetchPool, PageResult};
use crate::crawler::report::CrawlReport;
use crate::crawler::scheduler::Politeness;
use crate::frontier::Frontier;
use crate::spider::{compose, BoxedMiddleware, BoxedSpider, Spider, SpiderError, SpiderResult};
use crate::url::normalize_url;
use crate::{Result, SumiError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Where a crawler is in its run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Running,
    Draining,
}

/// Tunables for a [`Crawler`]
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Number of fetch workers, and the cap on pages in flight
    pub concurrency: usize,
    pub sleep_min: Duration,
    pub sleep_max: Duration,
    pub fetch_timeout: Duration,

    /// Capacity of the channel carrying finished pages back to the coordinator
    ///
    /// Fetches run ahead of spider processing by up to this many pages, so
    /// at most `concurrency + queue_capacity` URLs are pending at once.
    pub queue_capacity: usize,

    /// Fixes the politeness RNG; `None` seeds it from the OS
    pub seed: Option<u64>,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlerOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency as usize,
            sleep_min: Duration::from_secs(config.sleep_min),
            sleep_max: Duration::from_secs(config.sleep_max),
            fetch_timeout: Duration::from_secs(config.fetch_timeout),
            queue_capacity: config.queue_capacity,
            seed: None,
        }
    }
}

struct SpiderChain {
    name: String,
    spider: BoxedSpider,
}

/// Drives a crawl over a [`Frontier`]
///
/// A crawler runs at most one crawl at a time. Calling [`Crawler::crawl`]
/// while a crawl is in progress fails with [`SumiError::AlreadyRunning`].
pub struct Crawler {
    options: CrawlerOptions,
    frontier: Arc<dyn Frontier>,
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn DocumentParser>,
    chains: Vec<SpiderChain>,
    politeness: Politeness,
    running: AtomicBool,
    phase: Mutex<CrawlPhase>,
    cancel: CancellationToken,
}

/// Releases the running flag when a crawl ends, however it ends
struct RunGuard<'a> {
    crawler: &'a Crawler,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.crawler.set_phase(CrawlPhase::Idle);
        self.crawler.running.store(false, Ordering::SeqCst);
    }
}

impl Crawler {
    pub fn new(
        options: CrawlerOptions,
        frontier: Arc<dyn Frontier>,
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        let politeness = Politeness::new(options.sleep_min, options.sleep_max, options.seed);

        Self {
            options,
            frontier,
            fetcher,
            parser,
            chains: Vec::new(),
            politeness,
            running: AtomicBool::new(false),
            phase: Mutex::new(CrawlPhase::Idle),
            cancel: CancellationToken::new(),
        }
    }

    /// Appends a spider chain
    ///
    /// `middlewares[0]` wraps outermost. Chains are offered each page in
    /// registration order and never see each other's results.
    pub fn register_spider<S>(&mut self, spider: S, middlewares: Vec<BoxedMiddleware>)
    where
        S: Spider + 'static,
    {
        let name = format!("{}#{}", spider.name(), self.chains.len());
        let spider = compose(Arc::new(spider), &middlewares);
        tracing::debug!("Registered spider chain {}", name);
        self.chains.push(SpiderChain { name, spider });
    }

    pub fn phase(&self) -> CrawlPhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_phase(&self, next: CrawlPhase) {
        match self.phase.lock() {
            Ok(mut phase) => *phase = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn frontier(&self) -> &Arc<dyn Frontier> {
        &self.frontier
    }

    /// Requests a cooperative stop
    ///
    /// No new URLs are dispatched; pages already in flight are finished and
    /// recorded. The stop is permanent for this crawler.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this crawler when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawls from `seeds` until the frontier is exhausted or a stop is requested
    ///
    /// Seeds are normalized and enqueued, then URLs left Pending by an
    /// interrupted run are returned to Ready. Per-URL failures never abort the
    /// crawl; they are listed in [`CrawlReport::failed`].
    pub async fn crawl<I, S>(&self, seeds: I) -> Result<CrawlReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SumiError::AlreadyRunning);
        }
        let _guard = RunGuard { crawler: self };
        self.set_phase(CrawlPhase::Running);

        let start_time = Instant::now();
        let mut report = CrawlReport::new();

        let seeds = normalize_all(seeds);
        report.seeds_enqueued = self.frontier.enqueue(&seeds);
        report.repaired = match self.frontier.repair() {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Failed to repair frontier: {}", e);
                0
            }
        };
        tracing::info!(
            "Starting crawl: {} seeds enqueued, {} pending URLs repaired, {} spider chains",
            report.seeds_enqueued,
            report.repaired,
            self.chains.len()
        );

        let concurrency = self.options.concurrency.max(1);
        let max_in_flight = concurrency + self.options.queue_capacity.max(1);
        let mut pool = FetchPool::spawn(
            concurrency,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.parser),
            self.options.fetch_timeout,
            self.options.queue_capacity,
        );

        let mut in_flight = 0usize;
        let mut workers_alive = true;

        loop {
            while workers_alive && in_flight < max_in_flight && !self.cancel.is_cancelled() {
                let raw = match self.frontier.dequeue() {
                    Ok(Some(raw)) => raw,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to dequeue: {}", e);
                        break;
                    }
                };

                let url = match Url::parse(&raw) {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!("Unparseable URL in frontier {}: {}", raw, e);
                        self.finish(&raw, false, &mut report);
                        continue;
                    }
                };

                if pool.submit(url).await {
                    in_flight += 1;
                } else {
                    tracing::error!("Fetch workers exited; {} stays pending", raw);
                    workers_alive = false;
                }
            }

            if in_flight == 0 {
                break;
            }

            let Some(result) = pool.next().await else {
                tracing::error!("Fetch workers exited with {} pages in flight", in_flight);
                break;
            };
            in_flight -= 1;

            self.process_page(result, &mut report).await;

            let processed = report.pages_processed();
            if processed > 0 && processed % 10 == 0 {
                let rate = processed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} pages processed, {} in flight, {:.2} pages/sec",
                    processed,
                    in_flight,
                    rate
                );
            }

            if let Some(delay) = self.politeness.next_delay() {
                tracing::trace!("Sleeping {:?}", delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        self.set_phase(CrawlPhase::Draining);
        pool.shutdown().await;

        if let Err(e) = self.frontier.cleanup() {
            tracing::error!("Frontier cleanup failed: {}", e);
        }

        report.failed = match self.frontier.failed_urls() {
            Ok(failed) => failed,
            Err(e) => {
                tracing::error!("Failed to read failed URLs: {}", e);
                Vec::new()
            }
        };
        for url in &report.failed {
            tracing::warn!("Failed: {}", url);
        }

        report.stopped = self.cancel.is_cancelled();
        report.elapsed = start_time.elapsed();

        tracing::info!(
            "Crawl {}: {} done, {} failed, {} links enqueued in {:.1}s",
            if report.stopped { "stopped" } else { "complete" },
            report.pages_done,
            report.pages_failed,
            report.links_enqueued,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Offers a fetched page to every chain and records its terminal state
    async fn process_page(&self, result: PageResult, report: &mut CrawlReport) {
        let PageResult { url, outcome } = result;

        let document = match outcome {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", url, e);
                self.finish(url.as_str(), false, report);
                return;
            }
        };

        let mut chains: JoinSet<(usize, SpiderResult)> = JoinSet::new();
        for (index, chain) in self.chains.iter().enumerate() {
            let spider = Arc::clone(&chain.spider);
            let document = Arc::clone(&document);
            let url = url.clone();
            chains.spawn_blocking(move || (index, spider.parse(&url, &document)));
        }

        let mut chain_failed = false;
        let mut links = Vec::new();
        while let Some(joined) = chains.join_next().await {
            match joined {
                Ok((_, Ok(found))) => links.extend(found),
                Ok((index, Err(e))) => {
                    chain_failed = true;
                    tracing::warn!("Spider {} failed on {}: {}", self.chains[index].name, url, e);
                }
                Err(e) => {
                    chain_failed = true;
                    let e = SpiderError::Aborted(e.to_string());
                    tracing::warn!("Spider task failed on {}: {}", url, e);
                }
            }
        }

        let links = normalize_all(links);
        let admitted = self.frontier.enqueue(&links);
        tracing::debug!("{}: {} links found, {} new", url, links.len(), admitted);
        report.links_enqueued += admitted;

        self.finish(url.as_str(), !chain_failed, report);
    }

    fn finish(&self, url: &str, success: bool, report: &mut CrawlReport) {
        let marked = if success {
            report.pages_done += 1;
            self.frontier.mark_done(url)
        } else {
            report.pages_failed += 1;
            self.frontier.mark_failed(url)
        };

        if let Err(e) = marked {
            tracing::error!("Failed to record state for {}: {}", url, e);
        }
    }
}

/// Normalizes each URL, skipping the ones that cannot be crawled
fn normalize_all<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    urls.into_iter()
        .filter_map(|raw| match normalize_url(raw.as_ref()) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::debug!("Skipping URL {}: {}", raw.as_ref(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FetchError, FetchedPage};
    use crate::crawler::parser::HtmlParser;
    use crate::frontier::MemoryFrontier;
    use crate::spider::{spider_fn, Document, LinkSpider, SpiderError};
    use crate::state::UrlState;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, Semaphore};

    const SITE: &str = "https://site.test";

    fn u(path: &str) -> String {
        format!("{}/{}", SITE, path)
    }

    /// Serves canned pages; unknown URLs, and URLs mapped to a status, fail
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, std::result::Result<String, u16>>,
        delay: Duration,
        calls: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl MapFetcher {
        fn page(mut self, path: &str, links: &[&str]) -> Self {
            let body: String = std::iter::once("<html><body>".to_string())
                .chain(links.iter().map(|l| format!(r#"<a href="{}">x</a>"#, u(l))))
                .chain(std::iter::once("</body></html>".to_string()))
                .collect();
            self.pages.insert(u(path), Ok(body));
            self
        }

        fn raw(mut self, path: &str, body: &str) -> Self {
            self.pages.insert(u(path), Ok(body.to_string()));
            self
        }

        fn status(mut self, path: &str, status: u16) -> Self {
            self.pages.insert(u(path), Err(status));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(
            &self,
            url: &Url,
            _timeout: Duration,
        ) -> std::result::Result<FetchedPage, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(url.as_str()) {
                Some(Ok(body)) => Ok(FetchedPage::new(url.clone(), body.clone().into_bytes())),
                Some(Err(status)) => Err(FetchError::Status(*status)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    fn options(concurrency: usize) -> CrawlerOptions {
        CrawlerOptions {
            concurrency,
            sleep_min: Duration::ZERO,
            sleep_max: Duration::ZERO,
            fetch_timeout: Duration::from_secs(5),
            queue_capacity: 8,
            seed: Some(1),
        }
    }

    fn crawler(fetcher: Arc<MapFetcher>, frontier: Arc<MemoryFrontier>) -> Crawler {
        let mut crawler = Crawler::new(
            options(2),
            frontier,
            fetcher,
            Arc::new(HtmlParser::new(1024 * 1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());
        crawler
    }

    #[tokio::test]
    async fn test_crawl_follows_links_to_exhaustion() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .page("u1", &["u3"])
                .page("u2", &[])
                .page("u3", &[]),
        );
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(Arc::clone(&fetcher), Arc::clone(&frontier));

        let report = crawler.crawl([u("u1"), u("u2")]).await.unwrap();

        assert_eq!(report.seeds_enqueued, 2);
        assert_eq!(report.pages_done, 3);
        assert_eq!(report.pages_failed, 0);
        assert_eq!(report.links_enqueued, 1);
        assert!(report.failed.is_empty());
        assert!(!report.stopped);
        for path in ["u1", "u2", "u3"] {
            assert_eq!(frontier.state_of(&u(path)).unwrap(), Some(UrlState::Done));
        }
        assert_eq!(fetcher.calls().len(), 3);
        assert_eq!(crawler.phase(), CrawlPhase::Idle);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let fetcher = Arc::new(MapFetcher::default().status("u1", 500).page("u2", &[]));
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(fetcher, Arc::clone(&frontier));

        let report = crawler.crawl([u("u1"), u("u2")]).await.unwrap();

        assert_eq!(report.failed, vec![u("u1")]);
        assert_eq!(report.pages_done, 1);
        assert_eq!(frontier.state_of(&u("u1")).unwrap(), Some(UrlState::Failed));
        assert_eq!(frontier.state_of(&u("u2")).unwrap(), Some(UrlState::Done));
    }

    #[tokio::test]
    async fn test_cyclic_links_fetched_once() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .page("a", &["b", "a"])
                .page("b", &["a", "c"])
                .page("c", &["a", "b"]),
        );
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(Arc::clone(&fetcher), frontier);

        let report = crawler.crawl([u("a")]).await.unwrap();

        assert_eq!(report.pages_done, 3);
        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(calls, vec![u("a"), u("b"), u("c")]);
    }

    #[tokio::test]
    async fn test_zero_politeness_runs_without_delay() {
        let mut fetcher = MapFetcher::default();
        let seeds: Vec<String> = (0..100).map(|i| u(&format!("p{}", i))).collect();
        for i in 0..100 {
            fetcher = fetcher.raw(&format!("p{}", i), "<p>no links</p>");
        }
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(Arc::new(fetcher), frontier);

        let report = crawler.crawl(&seeds).await.unwrap();

        assert_eq!(report.pages_done, 100);
        assert!(report.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut fetcher = MapFetcher {
            delay: Duration::from_millis(10),
            ..MapFetcher::default()
        };
        let seeds: Vec<String> = (0..20).map(|i| u(&format!("p{}", i))).collect();
        for i in 0..20 {
            fetcher = fetcher.raw(&format!("p{}", i), "<p>leaf</p>");
        }
        let fetcher = Arc::new(fetcher);
        let mut crawler = Crawler::new(
            options(3),
            Arc::new(MemoryFrontier::new()),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(HtmlParser::new(1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());

        let report = crawler.crawl(&seeds).await.unwrap();

        assert_eq!(report.pages_done, 20);
        assert!(fetcher.max_active.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_chain_error_fails_page_but_keeps_other_links() {
        let fetcher = Arc::new(MapFetcher::default().page("u1", &["u2"]).page("u2", &[]));
        let frontier = Arc::new(MemoryFrontier::new());
        let mut crawler = crawler(Arc::clone(&fetcher), Arc::clone(&frontier));
        crawler.register_spider(
            spider_fn("broken", |_url: &Url, _doc: &Document| {
                Err(SpiderError::Extraction {
                    spider: "broken".to_string(),
                    message: "no luck".to_string(),
                })
            }),
            Vec::new(),
        );

        let report = crawler.crawl([u("u1")]).await.unwrap();

        assert_eq!(report.links_enqueued, 1);
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(frontier.state_of(&u("u1")).unwrap(), Some(UrlState::Failed));
        assert_eq!(frontier.state_of(&u("u2")).unwrap(), Some(UrlState::Failed));
        assert_eq!(report.pages_done, 0);
    }

    #[tokio::test]
    async fn test_parse_error_runs_no_chains() {
        let fetcher = Arc::new(MapFetcher::default().raw("empty", ""));
        let frontier = Arc::new(MemoryFrontier::new());
        let invoked = Arc::new(AtomicUsize::new(0));
        let mut crawler = crawler(fetcher, Arc::clone(&frontier));
        let counter = Arc::clone(&invoked);
        crawler.register_spider(
            spider_fn("counter", move |_url: &Url, _doc: &Document| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }),
            Vec::new(),
        );

        let report = crawler.crawl([u("empty")]).await.unwrap();

        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(report.failed, vec![u("empty")]);
    }

    #[tokio::test]
    async fn test_every_chain_sees_every_page() {
        let fetcher = Arc::new(MapFetcher::default().page("u1", &["u2"]).page("u2", &[]));
        let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut crawler = Crawler::new(
            options(1),
            Arc::new(MemoryFrontier::new()),
            fetcher,
            Arc::new(HtmlParser::new(1024)),
        );
        for id in 0..2 {
            let seen = Arc::clone(&seen);
            crawler.register_spider(
                spider_fn("recorder", move |url: &Url, doc: &Document| {
                    seen.lock().unwrap().push((id, url.to_string()));
                    Ok(doc.links().to_vec())
                }),
                Vec::new(),
            );
        }

        crawler.crawl([u("u1")]).await.unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![(0, u("u1")), (0, u("u2")), (1, u("u1")), (1, u("u2"))]
        );
    }

    #[tokio::test]
    async fn test_stop_before_crawl_keeps_seeds_ready() {
        let fetcher = Arc::new(MapFetcher::default().page("u1", &[]));
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(Arc::clone(&fetcher), Arc::clone(&frontier));

        crawler.stop();
        let report = crawler.crawl([u("u1")]).await.unwrap();

        assert!(report.stopped);
        assert!(fetcher.calls().is_empty());
        assert_eq!(frontier.state_of(&u("u1")).unwrap(), Some(UrlState::Ready));
    }

    #[tokio::test]
    async fn test_pending_urls_are_repaired() {
        let fetcher = Arc::new(MapFetcher::default().page("stale", &[]));
        let frontier = Arc::new(MemoryFrontier::new());
        frontier.enqueue(&[u("stale")]);
        assert_eq!(frontier.dequeue().unwrap(), Some(u("stale")));

        let crawler = crawler(fetcher, Arc::clone(&frontier));
        let report = crawler.crawl(Vec::<String>::new()).await.unwrap();

        assert_eq!(report.repaired, 1);
        assert_eq!(report.pages_done, 1);
        assert_eq!(frontier.state_of(&u("stale")).unwrap(), Some(UrlState::Done));
    }

    #[tokio::test]
    async fn test_second_crawl_revisits_nothing() {
        let fetcher = Arc::new(MapFetcher::default().page("u1", &["u2"]).page("u2", &[]));
        let frontier = Arc::new(MemoryFrontier::new());
        let crawler = crawler(Arc::clone(&fetcher), frontier);

        crawler.crawl([u("u1")]).await.unwrap();
        let second = crawler.crawl([u("u1")]).await.unwrap();

        assert_eq!(second.seeds_enqueued, 0);
        assert_eq!(second.pages_processed(), 0);
        assert_eq!(fetcher.calls().len(), 2);
    }

    /// Blocks every fetch until the test hands out permits
    struct GatedFetcher {
        started: Notify,
        release: Semaphore,
    }

    impl GatedFetcher {
        fn new() -> Self {
            Self {
                started: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(
            &self,
            url: &Url,
            _timeout: Duration,
        ) -> std::result::Result<FetchedPage, FetchError> {
            self.started.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            Ok(FetchedPage::new(url.clone(), b"<p>done</p>".to_vec()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_crawl_is_rejected() {
        let fetcher = Arc::new(GatedFetcher::new());
        let frontier = Arc::new(MemoryFrontier::new());
        let mut crawler = Crawler::new(
            options(1),
            Arc::clone(&frontier) as Arc<dyn Frontier>,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(HtmlParser::new(1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());
        let crawler = Arc::new(crawler);

        let first = {
            let crawler = Arc::clone(&crawler);
            tokio::spawn(async move { crawler.crawl([u("u1")]).await })
        };
        fetcher.started.notified().await;
        assert_eq!(crawler.phase(), CrawlPhase::Running);

        let second = crawler.crawl([u("other")]).await;
        assert!(matches!(second, Err(SumiError::AlreadyRunning)));
        assert_eq!(frontier.state_of(&u("other")).unwrap(), None);

        fetcher.release.add_permits(1);
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.pages_done, 1);
        assert_eq!(crawler.phase(), CrawlPhase::Idle);
    }

    #[tokio::test]
    async fn test_stop_finishes_in_flight_pages() {
        let fetcher = Arc::new(GatedFetcher::new());
        let frontier = Arc::new(MemoryFrontier::new());
        let mut crawler = Crawler::new(
            CrawlerOptions {
                queue_capacity: 1,
                ..options(1)
            },
            Arc::clone(&frontier) as Arc<dyn Frontier>,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(HtmlParser::new(1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());
        let crawler = Arc::new(crawler);

        let run = {
            let crawler = Arc::clone(&crawler);
            tokio::spawn(async move { crawler.crawl([u("a"), u("b"), u("c")]).await })
        };
        fetcher.started.notified().await;
        crawler.cancel_token().cancel();
        fetcher.release.add_permits(10);

        // At most two URLs were dispatched before the stop; "c" never was.
        let report = run.await.unwrap().unwrap();
        assert!(report.stopped);
        assert!((1..=2).contains(&report.pages_done));
        assert_eq!(report.pages_failed, 0);
        assert_eq!(frontier.state_of(&u("a")).unwrap(), Some(UrlState::Done));
        assert_eq!(frontier.state_of(&u("c")).unwrap(), Some(UrlState::Ready));
        assert_eq!(frontier.counts().unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_panicking_spider_fails_page() {
        let fetcher = Arc::new(MapFetcher::default().page("a", &["b"]).raw("b", "<p>b</p>"));
        let frontier = Arc::new(MemoryFrontier::new());
        let mut crawler = Crawler::new(
            options(1),
            Arc::clone(&frontier) as Arc<dyn Frontier>,
            fetcher,
            Arc::new(HtmlParser::new(1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());
        crawler.register_spider(
            spider_fn("crashy", |url: &Url, _doc: &Document| {
                if url.path() == "/a" {
                    panic!("boom");
                }
                Ok(Vec::new())
            }),
            Vec::new(),
        );

        let report = crawler.crawl([u("a")]).await.unwrap();

        // The surviving chain's links are still admitted.
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.pages_done, 1);
        assert_eq!(frontier.state_of(&u("a")).unwrap(), Some(UrlState::Failed));
        assert_eq!(frontier.state_of(&u("b")).unwrap(), Some(UrlState::Done));
    }

    #[tokio::test]
    async fn test_fetches_run_ahead_of_spiders() {
        let mut fetcher = MapFetcher::default();
        let seeds: Vec<String> = (0..4).map(|i| u(&format!("p{}", i))).collect();
        for i in 0..4 {
            fetcher = fetcher.raw(&format!("p{}", i), "<p>leaf</p>");
        }
        let fetcher = Arc::new(fetcher);
        let ran_ahead = Arc::new(AtomicBool::new(false));

        let mut crawler = Crawler::new(
            CrawlerOptions {
                queue_capacity: 3,
                ..options(1)
            },
            Arc::new(MemoryFrontier::new()),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(HtmlParser::new(1024)),
        );
        let (observer, flag) = (Arc::clone(&fetcher), Arc::clone(&ran_ahead));
        crawler.register_spider(
            spider_fn("slow", move |_url: &Url, _doc: &Document| {
                // While the first page is still being evaluated, the single
                // worker keeps fetching into the result queue.
                let deadline = std::time::Instant::now() + Duration::from_secs(5);
                while observer.calls().len() < 4 && std::time::Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(5));
                }
                if observer.calls().len() == 4 {
                    flag.store(true, Ordering::SeqCst);
                }
                Ok(Vec::new())
            }),
            Vec::new(),
        );

        let report = crawler.crawl(&seeds).await.unwrap();

        assert_eq!(report.pages_done, 4);
        assert!(ran_ahead.load(Ordering::SeqCst));
        assert_eq!(fetcher.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_politeness_delay_between_pages() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .raw("a", "<p>a</p>")
                .raw("b", "<p>b</p>")
                .raw("c", "<p>c</p>"),
        );
        let mut crawler = Crawler::new(
            CrawlerOptions {
                sleep_min: Duration::from_secs(1),
                sleep_max: Duration::from_secs(2),
                fetch_timeout: Duration::from_secs(3600),
                queue_capacity: 1,
                ..options(1)
            },
            Arc::new(MemoryFrontier::new()),
            fetcher,
            Arc::new(HtmlParser::new(1024)),
        );
        crawler.register_spider(LinkSpider, Vec::new());

        let report = crawler.crawl([u("a"), u("b"), u("c")]).await.unwrap();

        assert_eq!(report.pages_done, 3);
        assert!(report.elapsed >= Duration::from_secs(3), "{:?}", report.elapsed);
        assert!(report.elapsed < Duration::from_secs(7), "{:?}", report.elapsed);
    }

    #[tokio::test]
    async fn test_stop_interrupts_politeness_sleep() {
        let fetcher = Arc::new(MapFetcher::default().raw("a", "<p>a</p>"));
        let processed = Arc::new(Notify::new());
        let mut crawler = Crawler::new(
            CrawlerOptions {
                sleep_min: Duration::from_secs(1000),
                sleep_max: Duration::from_secs(2000),
                ..options(1)
            },
            Arc::new(MemoryFrontier::new()),
            fetcher,
            Arc::new(HtmlParser::new(1024)),
        );
        let signal = Arc::clone(&processed);
        crawler.register_spider(
            spider_fn("signal", move |_url: &Url, _doc: &Document| {
                signal.notify_one();
                Ok(Vec::new())
            }),
            Vec::new(),
        );
        let crawler = Arc::new(crawler);

        let run = {
            let crawler = Arc::clone(&crawler);
            tokio::spawn(async move { crawler.crawl([u("a")]).await })
        };
        processed.notified().await;
        crawler.stop();

        let report = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("stop did not wake the politeness sleep")
            .unwrap()
            .unwrap();
        assert!(report.stopped);
        assert_eq!(report.pages_done, 1);
        assert!(report.elapsed < Duration::from_secs(1000));
    }
}
