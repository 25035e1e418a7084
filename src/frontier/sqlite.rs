//! SQLite frontier implementation
//!
//! Each transition is a single conditional statement, so state changes are
//! atomic even when several processes share the database file. A crash leaves
//! in-flight URLs in `pending`, where `repair` finds them on the next run.

use crate::frontier::schema::initialize_schema;
use crate::frontier::traits::{Frontier, FrontierCounts, FrontierError, FrontierResult};
use crate::state::UrlState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed frontier, scoped to one session prefix
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
    prefix: String,
}

impl SqliteFrontier {
    /// Opens (or creates) the frontier database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `prefix` - Session key; sessions with different prefixes never see
    ///   each other's URLs
    pub fn open(path: &Path, prefix: &str) -> FrontierResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        Self::with_connection(conn, prefix)
    }

    /// Creates a frontier backed by an in-memory database
    pub fn open_in_memory(prefix: &str) -> FrontierResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, prefix)
    }

    fn with_connection(conn: Connection, prefix: &str) -> FrontierResult<Self> {
        if prefix.is_empty() {
            return Err(FrontierError::Database(
                "frontier prefix cannot be empty".to_string(),
            ));
        }
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            prefix: prefix.to_string(),
        })
    }

    /// The session prefix this frontier is scoped to
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn lock(&self) -> FrontierResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FrontierError::Poisoned)
    }
}

impl Frontier for SqliteFrontier {
    fn enqueue_one(&self, url: &str) -> FrontierResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO frontier_urls (prefix, url, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.prefix,
                url,
                UrlState::Ready.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(inserted == 1)
    }

    fn dequeue(&self) -> FrontierResult<Option<String>> {
        let conn = self.lock()?;
        let url = conn
            .query_row(
                "UPDATE frontier_urls SET state = ?1, updated_at = ?2
                 WHERE rowid = (
                     SELECT rowid FROM frontier_urls
                     WHERE prefix = ?3 AND state = ?4
                     ORDER BY rowid LIMIT 1
                 )
                 RETURNING url",
                params![
                    UrlState::Pending.to_db_string(),
                    Utc::now().to_rfc3339(),
                    self.prefix,
                    UrlState::Ready.to_db_string()
                ],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(url)
    }

    fn transition(&self, url: &str, from: UrlState, to: UrlState) -> FrontierResult<bool> {
        if !from.can_move_to(to) {
            return Ok(false);
        }

        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE frontier_urls SET state = ?1, updated_at = ?2
             WHERE prefix = ?3 AND url = ?4 AND state = ?5",
            params![
                to.to_db_string(),
                Utc::now().to_rfc3339(),
                self.prefix,
                url,
                from.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn repair(&self) -> FrontierResult<usize> {
        let conn = self.lock()?;
        let reclaimed = conn.execute(
            "UPDATE frontier_urls SET state = ?1, updated_at = ?2
             WHERE prefix = ?3 AND state = ?4",
            params![
                UrlState::Ready.to_db_string(),
                Utc::now().to_rfc3339(),
                self.prefix,
                UrlState::Pending.to_db_string()
            ],
        )?;
        Ok(reclaimed)
    }

    fn failed_urls(&self) -> FrontierResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT url FROM frontier_urls WHERE prefix = ?1 AND state = ?2 ORDER BY url",
        )?;
        let urls = stmt
            .query_map(
                params![self.prefix, UrlState::Failed.to_db_string()],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn cleanup(&self) -> FrontierResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA optimize; PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    fn state_of(&self, url: &str) -> FrontierResult<Option<UrlState>> {
        let conn = self.lock()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM frontier_urls WHERE prefix = ?1 AND url = ?2",
                params![self.prefix, url],
                |row| row.get(0),
            )
            .optional()?;

        match state {
            None => Ok(None),
            Some(s) => UrlState::from_db_string(&s)
                .map(Some)
                .ok_or_else(|| FrontierError::Database(format!("unknown state '{}'", s))),
        }
    }

    fn counts(&self) -> FrontierResult<FrontierCounts> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT state, COUNT(*) FROM frontier_urls WHERE prefix = ?1 GROUP BY state",
        )?;
        let rows = stmt.query_map(params![self.prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = FrontierCounts::default();
        for row in rows {
            let (state, count) = row?;
            if let Some(state) = UrlState::from_db_string(&state) {
                counts.add(state, count as u64);
            }
        }
        Ok(counts)
    }

    fn reset(&self) -> FrontierResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM frontier_urls WHERE prefix = ?1",
            params![self.prefix],
        )?;
        Ok(())
    }
}
