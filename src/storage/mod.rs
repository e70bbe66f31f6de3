//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Page upserts and lookups by id, URL and status
//! - Run tracking and resumption support
//! - Metadata and analysis artifact slots

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqlitePageStore;
pub use traits::{PageKey, PageStore, StoreError, StoreResult};

use std::path::Path;

/// Metadata key holding the RFC 3339 time the last crawl finished
pub const META_LAST_CRAWL: &str = "last-crawl";

/// Metadata key holding the base URL of the stored crawl
pub const META_BASE_URL: &str = "base-url";

/// Opens the page store at `path`, creating it when missing
///
/// With `resume` set the store must already exist and be readable.
pub fn open_store(path: &Path, resume: bool) -> StoreResult<SqlitePageStore> {
    if resume {
        SqlitePageStore::open_existing(path)
    } else {
        SqlitePageStore::open(path)
    }
}

/// Kind of analysis artifact kept in the artifact slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Navigation,
    PageTypes,
    Relationships,
    Objects,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        Self::Navigation,
        Self::PageTypes,
        Self::Relationships,
        Self::Objects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::PageTypes => "page-types",
            Self::Relationships => "relationships",
            Self::Objects => "objects",
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_fetched: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
