//! Integration tests for Site-Strata
//!
//! Crawls run against wiremock servers and write to temporary SQLite stores.

mod analysis_tests;
mod common;
mod crawl_tests;
