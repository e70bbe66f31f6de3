//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Strata page
//! store. The full page is kept as JSON in `data`; the scalar columns beside
//! it exist for lookups, ordering and statistics.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0
);

-- One row per normalized URL
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    status INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    content_hash TEXT,
    crawled_at TEXT NOT NULL,
    data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
CREATE INDEX IF NOT EXISTS idx_pages_crawled_at ON pages(crawled_at, id);
CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);

-- Run bookkeeping (last crawl, base URL, ...)
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Latest analysis output, one row per artifact kind
CREATE TABLE IF NOT EXISTS artifacts (
    kind TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Tables every page store must contain
pub const REQUIRED_TABLES: &[&str] = &["runs", "pages", "metadata", "artifacts"];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Returns the required tables missing from `conn`
pub fn missing_tables(conn: &rusqlite::Connection) -> Result<Vec<&'static str>, rusqlite::Error> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if count == 0 {
            missing.push(*table);
        }
    }
    Ok(missing)
}
