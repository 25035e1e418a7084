use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Summary of one `crawl` call
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,

    /// Seeds newly admitted to the frontier
    pub seeds_enqueued: usize,

    /// Pending URLs from an earlier run returned to Ready
    pub repaired: usize,

    pub pages_done: usize,
    pub pages_failed: usize,

    /// Discovered links newly admitted to the frontier
    pub links_enqueued: usize,

    /// True if the run ended through a stop request
    pub stopped: bool,

    pub elapsed: Duration,

    /// Snapshot of every Failed URL under this crawl's prefix
    pub failed: Vec<String>,
}

impl CrawlReport {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            seeds_enqueued: 0,
            repaired: 0,
            pages_done: 0,
            pages_failed: 0,
            links_enqueued: 0,
            stopped: false,
            elapsed: Duration::ZERO,
            failed: Vec::new(),
        }
    }

    /// Pages that reached a terminal state during this run
    pub fn pages_processed(&self) -> usize {
        self.pages_done + self.pages_failed
    }

    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_processed() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Crawl Report ===")?;
        writeln!(f, "Started:         {}", self.started_at.to_rfc3339())?;
        writeln!(f, "Elapsed:         {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Seeds enqueued:  {}", self.seeds_enqueued)?;
        writeln!(f, "Repaired:        {}", self.repaired)?;
        writeln!(f, "Pages done:      {}", self.pages_done)?;
        writeln!(f, "Pages failed:    {}", self.pages_failed)?;
        writeln!(f, "Links enqueued:  {}", self.links_enqueued)?;
        writeln!(f, "Rate:            {:.2} pages/sec", self.pages_per_second())?;
        if self.stopped {
            writeln!(f, "Stopped early; remaining URLs are kept for the next run")?;
        }
        if !self.failed.is_empty() {
            writeln!(f, "\nFailed URLs ({}):", self.failed.len())?;
            for url in &self.failed {
                writeln!(f, "  - {}", url)?;
            }
        }
        Ok(())
    }
}
