//! Frontier module: the crawl's deduplicating URL queue
//!
//! This module provides:
//! - The `Frontier` trait with its atomic state transitions
//! - `MemoryFrontier`, a mutex-guarded single-process store
//! - `SqliteFrontier`, a crash-recoverable store keyed by session prefix

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryFrontier;
pub use sqlite::SqliteFrontier;
pub use traits::{Frontier, FrontierCounts, FrontierError, FrontierResult};

use crate::config::{FrontierBackend, FrontierConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the frontier store described by the configuration
pub fn open_frontier(config: &FrontierConfig) -> FrontierResult<Arc<dyn Frontier>> {
    match config.backend {
        FrontierBackend::Memory => Ok(Arc::new(MemoryFrontier::new())),
        FrontierBackend::Sqlite => Ok(Arc::new(SqliteFrontier::open(
            Path::new(&config.database_path),
            &config.prefix,
        )?)),
    }
}
