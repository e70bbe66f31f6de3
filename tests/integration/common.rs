//! Shared fixtures for the integration tests

use site_strata::config::{AnalysisConfig, Config, CrawlConfig, StoreConfig, UserAgentConfig};
use site_strata::storage::SqlitePageStore;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `base_url` into `db_path`
///
/// Throttling is off and a single worker keeps request order deterministic.
pub fn create_test_config(base_url: &str, db_path: &PathBuf) -> Config {
    Config {
        crawl: CrawlConfig {
            throttle: 0,
            concurrency: 1,
            timeout_ms: 5_000,
            ..CrawlConfig::for_base_url(base_url)
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        store: StoreConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
        analysis: AnalysisConfig::default(),
    }
}

/// A temporary directory holding the test database
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("strata.db");
    (dir, path)
}

pub fn open(path: &PathBuf) -> SqlitePageStore {
    SqlitePageStore::open(path).expect("Failed to open store")
}

/// Wraps `body` in a minimal HTML document with a shared nav bar
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <nav><a href="/">Home</a></nav>
        <main>{body}</main>
        </body></html>"#
    )
}

pub async fn mount_page(server: &MockServer, page_path: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Paths requested from `server`, in arrival order
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p != "/robots.txt")
        .collect()
}
