//! Frontier trait and error types
//!
//! The frontier is the only mutable state shared between the coordinator and
//! the rest of the crawl. Every mutation goes through the operations below.

use crate::state::UrlState;
use thiserror::Error;

/// Errors that can occur during frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Frontier lock poisoned")]
    Poisoned,
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// Number of URLs in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub ready: u64,
    pub pending: u64,
    pub done: u64,
    pub failed: u64,
}

impl FrontierCounts {
    pub fn total(&self) -> u64 {
        self.ready + self.pending + self.done + self.failed
    }

    pub(crate) fn add(&mut self, state: UrlState, count: u64) {
        match state {
            UrlState::Ready => self.ready += count,
            UrlState::Pending => self.pending += count,
            UrlState::Done => self.done += count,
            UrlState::Failed => self.failed += count,
        }
    }
}

/// A deduplicating URL store with four disjoint states
///
/// Implementations must be safe to share between threads. Each single-URL
/// operation must be linearizable: two concurrent `enqueue_one` calls for the
/// same URL admit it at most once, and two concurrent `dequeue` calls never
/// return the same URL.
pub trait Frontier: Send + Sync {
    /// Admits `url` into `Ready` unless it is already known in any state
    ///
    /// Returns `true` if the URL was newly admitted.
    fn enqueue_one(&self, url: &str) -> FrontierResult<bool>;

    /// Atomically moves one URL from `Ready` to `Pending`
    ///
    /// Returns `None` when nothing is ready.
    fn dequeue(&self) -> FrontierResult<Option<String>>;

    /// Moves `url` from `from` to `to` if and only if it is currently in `from`
    /// and [`UrlState::can_move_to`] allows the move
    ///
    /// Returns `true` if the move happened. Illegal moves, such as a terminal
    /// URL back to `Ready`, return `false` and change nothing.
    fn transition(&self, url: &str, from: UrlState, to: UrlState) -> FrontierResult<bool>;

    /// Merges every `Pending` URL back into `Ready`
    ///
    /// Called once before a crawl starts to reclaim work orphaned by a crash.
    /// Returns the number of URLs reclaimed; a second call returns 0.
    fn repair(&self) -> FrontierResult<usize>;

    /// Snapshot of the URLs in `Failed`
    fn failed_urls(&self) -> FrontierResult<Vec<String>>;

    /// Post-run housekeeping; `Done` and `Failed` history is preserved
    fn cleanup(&self) -> FrontierResult<()>;

    /// Current state of `url`, if known
    fn state_of(&self, url: &str) -> FrontierResult<Option<UrlState>>;

    /// Number of URLs in each state
    fn counts(&self) -> FrontierResult<FrontierCounts>;

    /// Forgets every URL, for an explicit fresh crawl
    fn reset(&self) -> FrontierResult<()>;

    /// Admits each URL that is not already known
    ///
    /// Store errors are logged per URL and do not abort the batch; the URL is
    /// simply not scheduled this round. Returns the number newly admitted.
    fn enqueue(&self, urls: &[String]) -> usize {
        let mut admitted = 0;
        for url in urls {
            match self.enqueue_one(url) {
                Ok(true) => admitted += 1,
                Ok(false) => tracing::trace!("Skipping known URL {}", url),
                Err(e) => tracing::error!("Failed to enqueue {}: {}", url, e),
            }
        }
        admitted
    }

    /// Moves `url` from `Pending` to `Done`
    fn mark_done(&self, url: &str) -> FrontierResult<()> {
        if !self.transition(url, UrlState::Pending, UrlState::Done)? {
            tracing::warn!("mark_done: {} was not pending", url);
        }
        Ok(())
    }

    /// Moves `url` from `Pending` to `Failed`
    fn mark_failed(&self, url: &str) -> FrontierResult<()> {
        if !self.transition(url, UrlState::Pending, UrlState::Failed)? {
            tracing::warn!("mark_failed: {} was not pending", url);
        }
        Ok(())
    }
}
