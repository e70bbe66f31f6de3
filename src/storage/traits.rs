//! Storage traits and error types
//!
//! This module defines the trait interface for page store backends and
//! associated error types.

use crate::model::Page;
use crate::storage::{ArtifactKind, RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Page store not found: {0}")]
    NotFound(String),

    #[error("Page store is unreadable or corrupt: {0}")]
    Corrupt(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Lookup key for a stored page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKey<'a> {
    /// Page id (hash of the normalized URL)
    Id(&'a str),
    /// Any form of the URL; normalized before lookup
    Url(&'a str),
}

/// Trait for page store implementations
///
/// A page store is a durable collection of crawled pages keyed by page id,
/// plus a key/value metadata slot and an artifact slot for analysis output.
/// Every write is a single statement or a transaction, so readers never see
/// a partially written page.
pub trait PageStore: Send {
    // ===== Pages =====

    /// Inserts `page`, or overwrites the stored page with the same id
    fn upsert(&mut self, page: &Page) -> StoreResult<()>;

    /// Gets a page by id or URL
    fn get(&self, key: PageKey<'_>) -> StoreResult<Option<Page>>;

    /// Checks whether a page is stored without loading it
    fn contains(&self, key: PageKey<'_>) -> StoreResult<bool>;

    /// All pages, ordered by crawl time then id
    fn all(&self) -> StoreResult<Vec<Page>>;

    /// Pages with the given HTTP status (0 for network failures)
    fn by_status(&self, status: u16) -> StoreResult<Vec<Page>>;

    /// Total number of stored pages
    fn count(&self) -> StoreResult<u64>;

    /// Number of stored pages with a 2xx status
    fn count_successful(&self) -> StoreResult<u64>;

    /// URLs of every stored page
    fn urls(&self) -> StoreResult<Vec<String>>;

    /// Removes every page, metadata entry, artifact and run record
    fn clear(&mut self) -> StoreResult<()>;

    // ===== Metadata =====

    fn set_meta(&mut self, key: &str, value: &str) -> StoreResult<()>;

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>>;

    // ===== Artifacts =====

    /// Stores the JSON body of an analysis artifact, replacing the previous one
    fn save_artifact(&mut self, kind: ArtifactKind, body: &str) -> StoreResult<()>;

    fn load_artifact(&self, kind: ArtifactKind) -> StoreResult<Option<String>>;

    // ===== Runs =====

    /// Records the start of a crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StoreResult<i64>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus, pages_fetched: u64)
        -> StoreResult<()>;

    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord>;

    fn latest_run(&self) -> StoreResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Page count per HTTP status
    fn status_breakdown(&self) -> StoreResult<BTreeMap<u16, u64>>;

    /// Page count per crawl depth
    fn depth_breakdown(&self) -> StoreResult<BTreeMap<u32, u64>>;

    /// Content hashes shared by more than one page, with their page count
    fn duplicate_content(&self) -> StoreResult<Vec<(String, u64)>>;
}
