//! Fixed-size fetch worker pool
//!
//! Workers share one bounded URL channel and one bounded result channel. The
//! result channel's capacity is the backpressure threshold: when the
//! coordinator falls behind, workers block on send instead of fetching more.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::parser::{DocumentParser, ParseError};
use crate::spider::Document;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a page produced no document
#[derive(Debug, Error)]
pub enum PageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// The outcome of fetching and parsing one URL
#[derive(Debug)]
pub struct PageResult {
    /// The URL as dequeued; the document carries the post-redirect URL
    pub url: Url,
    pub outcome: Result<Arc<Document>, PageError>,
}

pub struct FetchPool {
    urls: mpsc::Sender<Url>,
    results: mpsc::Receiver<PageResult>,
    workers: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl FetchPool {
    /// Starts `concurrency` workers
    ///
    /// The URL channel holds at most `concurrency` entries and the result
    /// channel at most `capacity`.
    pub fn spawn(
        concurrency: usize,
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn DocumentParser>,
        timeout: Duration,
        capacity: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let (url_tx, url_rx) = mpsc::channel(concurrency);
        let (result_tx, result_rx) = mpsc::channel(capacity.max(1));
        let url_rx = Arc::new(Mutex::new(url_rx));
        let token = CancellationToken::new();

        let workers = (0..concurrency)
            .map(|id| {
                let worker = Worker {
                    id,
                    fetcher: Arc::clone(&fetcher),
                    parser: Arc::clone(&parser),
                    timeout,
                    urls: Arc::clone(&url_rx),
                    results: result_tx.clone(),
                    token: token.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::debug!("Started {} fetch workers", concurrency);

        Self {
            urls: url_tx,
            results: result_rx,
            workers,
            token,
        }
    }

    /// Hands a URL to the workers; returns false if they have all exited
    pub async fn submit(&self, url: Url) -> bool {
        self.urls.send(url).await.is_ok()
    }

    /// Receives the next finished page, or `None` once every worker is gone
    pub async fn next(&mut self) -> Option<PageResult> {
        self.results.recv().await
    }

    /// Stops the workers after their current URL and waits for them
    pub async fn shutdown(self) {
        let FetchPool {
            urls,
            results,
            workers,
            token,
        } = self;

        token.cancel();
        drop(urls);
        drop(results);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("Fetch worker exited abnormally: {}", e);
            }
        }
    }
}

struct Worker {
    id: usize,
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn DocumentParser>,
    timeout: Duration,
    urls: Arc<Mutex<mpsc::Receiver<Url>>>,
    results: mpsc::Sender<PageResult>,
    token: CancellationToken,
}

impl Worker {
    async fn run(self) {
        loop {
            let url = tokio::select! {
                _ = self.token.cancelled() => break,
                url = async { self.urls.lock().await.recv().await } => match url {
                    Some(url) => url,
                    None => break,
                },
            };

            tracing::debug!("Worker {} fetching {}", self.id, url);
            let outcome = self.fetch_and_parse(&url).await;
            if self.results.send(PageResult { url, outcome }).await.is_err() {
                break;
            }
        }
        tracing::trace!("Worker {} stopped", self.id);
    }

    async fn fetch_and_parse(&self, url: &Url) -> Result<Arc<Document>, PageError> {
        let page = tokio::time::timeout(self.timeout, self.fetcher.fetch(url, self.timeout))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let parser = Arc::clone(&self.parser);
        let document = tokio::task::spawn_blocking(move || parser.parse(&page.final_url, &page.body))
            .await
            .map_err(|e| ParseError::Aborted(e.to_string()))??;

        Ok(Arc::new(document))
    }
}
