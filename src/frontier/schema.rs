//! Database schema for the SQLite frontier

/// One row per `(prefix, url)`; the single `state` column keeps the four
/// sets disjoint. Rowid order is admission order.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS frontier_urls (
    prefix TEXT NOT NULL,
    url TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('ready', 'pending', 'done', 'failed')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (prefix, url)
);

CREATE INDEX IF NOT EXISTS idx_frontier_urls_state ON frontier_urls(prefix, state);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
