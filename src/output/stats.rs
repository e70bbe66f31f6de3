//! Statistics generation from the page store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::crawler::SYNTHETIC_FAILURE_STATUS;
use crate::storage::{PageStore, RunRecord, StoreResult, META_BASE_URL, META_LAST_CRAWL};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Base URL the store was crawled from
    pub base_url: Option<String>,

    /// RFC 3339 time the last crawl finished
    pub last_crawl: Option<String>,

    /// Total number of stored pages
    pub total_pages: u64,

    /// Pages with a 2xx status
    pub successful_pages: u64,

    /// Count of pages by HTTP status (0 for network failures)
    pub pages_by_status: BTreeMap<u16, u64>,

    /// Count of pages by crawl depth
    pub pages_by_depth: BTreeMap<u32, u64>,

    /// Content hashes shared by several pages, with their page count
    pub duplicate_content: Vec<(String, u64)>,

    /// Most recent crawl run
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Pages whose fetch never produced an HTTP response
    pub fn network_failures(&self) -> u64 {
        self.pages_by_status
            .get(&SYNTHETIC_FAILURE_STATUS)
            .copied()
            .unwrap_or(0)
    }

    /// Share of stored pages with a 2xx status, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_pages > 0 {
            (self.successful_pages as f64 / self.total_pages as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from the page store
pub fn load_statistics(store: &dyn PageStore) -> StoreResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        base_url: store.get_meta(META_BASE_URL)?,
        last_crawl: store.get_meta(META_LAST_CRAWL)?,
        total_pages: store.count()?,
        successful_pages: store.count_successful()?,
        pages_by_status: store.status_breakdown()?,
        pages_by_depth: store.depth_breakdown()?,
        duplicate_content: store.duplicate_content()?,
        latest_run: store.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    if let Some(base_url) = &stats.base_url {
        println!("  Base URL: {}", base_url);
    }
    if let Some(last_crawl) = &stats.last_crawl {
        println!("  Last crawl: {}", last_crawl);
    }
    println!("  Total pages stored: {}", stats.total_pages);
    println!("  Network failures: {}", stats.network_failures());
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  ID: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Pages fetched: {}", run.pages_fetched);
        println!();
    }

    println!("Pages by Status:");
    for (status, count) in &stats.pages_by_status {
        let label = if *status == SYNTHETIC_FAILURE_STATUS {
            "network error".to_string()
        } else {
            status.to_string()
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage(*count, stats.total_pages));
    }
    println!();

    println!("Pages by Depth:");
    for (depth, count) in &stats.pages_by_depth {
        println!("  {}: {}", depth, count);
    }
    println!();

    if !stats.duplicate_content.is_empty() {
        println!("Duplicate Content ({} groups):", stats.duplicate_content.len());
        for (hash, count) in &stats.duplicate_content {
            println!("  {} shared by {} pages", hash, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages with a 2xx response)",
        stats.success_rate(),
        stats.successful_pages,
        stats.total_pages
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
