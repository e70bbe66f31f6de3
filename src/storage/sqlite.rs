//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the PageStore trait.

use crate::model::Page;
use crate::storage::schema::{initialize_schema, missing_tables};
use crate::storage::traits::{PageKey, PageStore, StoreError, StoreResult};
use crate::storage::{ArtifactKind, RunRecord, RunStatus};
use crate::url::{normalize_url, page_id};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite page store
pub struct SqlitePageStore {
    conn: Connection,
}

impl SqlitePageStore {
    /// Opens the page store at `path`, creating it if missing
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqlitePageStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        configure(&conn)?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Opens an existing page store for resuming
    ///
    /// Fails when the file is missing, is not a SQLite database, fails the
    /// integrity check, or lacks the page store tables.
    pub fn open_existing(path: &Path) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        let corrupt = |e: rusqlite::Error| StoreError::Corrupt(format!("{}: {}", path.display(), e));

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(corrupt)?;

        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(corrupt)?;
        if check != "ok" {
            return Err(StoreError::Corrupt(format!(
                "{}: integrity check reported '{}'",
                path.display(),
                check
            )));
        }

        let missing = missing_tables(&conn).map_err(corrupt)?;
        if !missing.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "{}: missing tables {}",
                path.display(),
                missing.join(", ")
            )));
        }

        configure(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory page store
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_pages(&self, sql: &str, args: impl rusqlite::Params) -> StoreResult<Vec<Page>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;

        let mut pages = Vec::new();
        for data in rows {
            pages.push(serde_json::from_str(&data?)?);
        }
        Ok(pages)
    }

    fn lookup_id(key: PageKey<'_>) -> String {
        match key {
            PageKey::Id(id) => id.to_string(),
            PageKey::Url(url) => match normalize_url(url) {
                Ok(normalized) => page_id(&normalized),
                Err(_) => String::new(),
            },
        }
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    // Configure SQLite for better performance
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )
}

/// RFC 3339 with fixed precision so text ordering matches time ordering
fn timestamp(at: &chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Interrupted),
        pages_fetched: row.get::<_, i64>(5)? as u64,
    })
}

impl PageStore for SqlitePageStore {
    // ===== Pages =====

    fn upsert(&mut self, page: &Page) -> StoreResult<()> {
        let data = serde_json::to_string(page)?;
        self.conn.execute(
            "INSERT INTO pages (id, url, status, depth, content_hash, crawled_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                status = excluded.status,
                depth = excluded.depth,
                content_hash = excluded.content_hash,
                crawled_at = excluded.crawled_at,
                data = excluded.data",
            params![
                page.id,
                page.url,
                page.status,
                page.depth,
                page.content_hash,
                timestamp(&page.crawled_at),
                data
            ],
        )?;
        Ok(())
    }

    fn get(&self, key: PageKey<'_>) -> StoreResult<Option<Page>> {
        let id = Self::lookup_id(key);
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM pages WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, key: PageKey<'_>) -> StoreResult<bool> {
        let id = Self::lookup_id(key);
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM pages WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn all(&self) -> StoreResult<Vec<Page>> {
        self.query_pages("SELECT data FROM pages ORDER BY crawled_at, id", [])
    }

    fn by_status(&self, status: u16) -> StoreResult<Vec<Page>> {
        self.query_pages(
            "SELECT data FROM pages WHERE status = ?1 ORDER BY crawled_at, id",
            params![status],
        )
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_successful(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status >= 200 AND status < 300",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn urls(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM pages ORDER BY crawled_at, id")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    fn clear(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM pages;
            DELETE FROM metadata;
            DELETE FROM artifacts;
            DELETE FROM runs;
        ",
        )?;
        tx.commit()?;
        Ok(())
    }

    // ===== Metadata =====

    fn set_meta(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // ===== Artifacts =====

    fn save_artifact(&mut self, kind: ArtifactKind, body: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO artifacts (kind, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![kind.as_str(), body, timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    fn load_artifact(&self, kind: ArtifactKind) -> StoreResult<Option<String>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM artifacts WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }

    // ===== Runs =====

    fn create_run(&mut self, config_hash: &str) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                timestamp(&Utc::now()),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_fetched: u64,
    ) -> StoreResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_fetched = ?3 WHERE id = ?4",
            params![
                status.to_db_string(),
                timestamp(&Utc::now()),
                pages_fetched as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, pages_fetched
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StoreError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StoreResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, pages_fetched
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Statistics =====

    fn status_breakdown(&self) -> StoreResult<BTreeMap<u16, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM pages GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u16>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            breakdown.insert(status, count as u64);
        }
        Ok(breakdown)
    }

    fn depth_breakdown(&self) -> StoreResult<BTreeMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM pages GROUP BY depth")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }
        Ok(breakdown)
    }

    fn duplicate_content(&self) -> StoreResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_hash, COUNT(*) AS n FROM pages
             WHERE content_hash IS NOT NULL
             GROUP BY content_hash HAVING n > 1
             ORDER BY n DESC, content_hash",
        )?;
        let duplicates = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageSnapshot;
    use crate::url::to_id;
    use chrono::Duration;

    fn create_test_page(url: &str, status: u16) -> Page {
        let snapshot = PageSnapshot {
            final_url: url.to_string(),
            status,
            title: Some(format!("Title of {}", url)),
            content_hash: Some("hash".to_string()),
            ..Default::default()
        };
        Page::from_snapshot(to_id(url).unwrap(), snapshot, 1)
    }

    #[test]
    fn test_create_in_memory() {
        let store = SqlitePageStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_upsert_and_get() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        let page = create_test_page("https://example.com/a", 200);
        store.upsert(&page).unwrap();

        let by_id = store.get(PageKey::Id(&page.id)).unwrap().unwrap();
        assert_eq!(by_id, page);

        let by_url = store
            .get(PageKey::Url("https://EXAMPLE.com/a/"))
            .unwrap()
            .unwrap();
        assert_eq!(by_url.id, page.id);

        assert!(store.get(PageKey::Id("missing")).unwrap().is_none());
        assert!(store.get(PageKey::Url("not a url")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites_in_place() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        let mut page = create_test_page("https://example.com/a", 500);
        store.upsert(&page).unwrap();

        page.status = 200;
        page.title = Some("Fixed".to_string());
        store.upsert(&page).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let stored = store.get(PageKey::Id(&page.id)).unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.title.as_deref(), Some("Fixed"));
    }

    #[test]
    fn test_all_ordered_by_crawl_time() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        let mut late = create_test_page("https://example.com/late", 200);
        let mut early = create_test_page("https://example.com/early", 200);
        early.crawled_at = late.crawled_at - Duration::seconds(10);
        late.crawled_at = early.crawled_at + Duration::seconds(5);

        store.upsert(&late).unwrap();
        store.upsert(&early).unwrap();

        let urls: Vec<String> = store.all().unwrap().into_iter().map(|p| p.url).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/early", "https://example.com/late"]
        );
    }

    #[test]
    fn test_counts_and_status_queries() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        store.upsert(&create_test_page("https://example.com/", 200)).unwrap();
        store.upsert(&create_test_page("https://example.com/b", 404)).unwrap();
        store
            .upsert(&Page::failed(
                to_id("https://example.com/c").unwrap(),
                "https://example.com/c".into(),
                1,
                "timeout",
            ))
            .unwrap();

        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.count_successful().unwrap(), 1);
        assert_eq!(store.by_status(404).unwrap().len(), 1);
        assert_eq!(store.by_status(0).unwrap()[0].fetch_error.as_deref(), Some("timeout"));
        assert!(store.contains(PageKey::Url("https://example.com/b")).unwrap());

        let breakdown = store.status_breakdown().unwrap();
        assert_eq!(breakdown.get(&200), Some(&1));
        assert_eq!(breakdown.get(&0), Some(&1));
        assert_eq!(store.depth_breakdown().unwrap().get(&1), Some(&3));
    }

    #[test]
    fn test_duplicate_content() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        store.upsert(&create_test_page("https://example.com/x", 200)).unwrap();
        store.upsert(&create_test_page("https://example.com/y", 200)).unwrap();

        let dups = store.duplicate_content().unwrap();
        assert_eq!(dups, vec![("hash".to_string(), 2)]);
    }

    #[test]
    fn test_metadata_and_artifacts() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        assert!(store.get_meta("last-crawl").unwrap().is_none());

        store.set_meta("last-crawl", "yesterday").unwrap();
        store.set_meta("last-crawl", "today").unwrap();
        assert_eq!(store.get_meta("last-crawl").unwrap().as_deref(), Some("today"));

        store.save_artifact(ArtifactKind::PageTypes, "[]").unwrap();
        store.save_artifact(ArtifactKind::PageTypes, "[1]").unwrap();
        assert_eq!(
            store.load_artifact(ArtifactKind::PageTypes).unwrap().as_deref(),
            Some("[1]")
        );
        assert!(store.load_artifact(ArtifactKind::Objects).unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        store.upsert(&create_test_page("https://example.com/", 200)).unwrap();
        store.set_meta("k", "v").unwrap();
        store.create_run("hash").unwrap();

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get_meta("k").unwrap().is_none());
        assert!(store.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_runs() {
        let mut store = SqlitePageStore::open_in_memory().unwrap();
        let run_id = store.create_run("test_hash").unwrap();
        assert!(run_id > 0);

        store.finish_run(run_id, RunStatus::Completed, 7).unwrap();
        let run = store.latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.pages_fetched, 7);
        assert!(run.finished_at.is_some());

        assert!(matches!(
            store.finish_run(999, RunStatus::Failed, 0),
            Err(StoreError::RunNotFound(999))
        ));
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqlitePageStore::open_existing(&dir.path().join("nope.db"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_open_existing_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is definitely not a sqlite database file").unwrap();

        let result = SqlitePageStore::open_existing(&path);
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_open_existing_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.db");
        {
            let mut store = SqlitePageStore::open(&path).unwrap();
            store.upsert(&create_test_page("https://example.com/", 200)).unwrap();
        }

        let store = SqlitePageStore::open_existing(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
