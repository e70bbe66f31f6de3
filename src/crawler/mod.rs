//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl pipeline, including:
//! - HTTP fetching through a pluggable renderer
//! - HTML extraction into page snapshots
//! - Frontier management and fetch throttling
//! - Overall crawl coordination over a worker pool

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{Coordinator, CrawlReport};
pub use fetcher::{
    build_http_client, fetch, snapshot_from_response, FetchError, HttpRenderer, RenderRequest,
    RenderedResponse, Renderer, MAX_REDIRECTS, SYNTHETIC_FAILURE_STATUS,
};
pub use parser::{content_hash, parse_html, ParsedPage};
pub(crate) use parser::looks_like_price;
pub use scheduler::{Frontier, QueuedUrl, Throttle};

use crate::config::{Config, RenderMode};
use crate::storage::PageStore;
use crate::{ConfigError, Result};
use std::sync::Arc;

/// Runs a complete crawl with the default HTTP renderer
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Clear the store, or rebuild the frontier from it when resuming
/// 2. Build the HTTP client
/// 3. Schedule and fetch pages on `concurrency` workers
/// 4. Extract and follow links within the crawl scope
/// 5. Record the run in the store
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `store` - The page store to write to
/// * `resume` - Continue from the pages already in `store`
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(StrataError)` - Crawl could not start or the store failed
///
/// # Example
///
/// ```no_run
/// use site_strata::config::load_config;
/// use site_strata::crawler::crawl;
/// use site_strata::storage::SqlitePageStore;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("strata.toml"))?;
/// let mut store = SqlitePageStore::open(Path::new(&config.store.database_path))?;
/// let report = crawl(&config, &mut store, false).await?;
/// println!("{} pages", report.fetched);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: &Config, store: &mut dyn PageStore, resume: bool) -> Result<CrawlReport> {
    if config.crawl.render_mode == RenderMode::Headless {
        return Err(ConfigError::Validation(
            "headless rendering requires an injected renderer".to_string(),
        )
        .into());
    }

    let client = build_http_client(&config.user_agent, config.crawl.timeout_ms)?;
    let renderer = Arc::new(HttpRenderer::new(client.clone()));
    Coordinator::new(config, store, renderer, client)?.run(resume).await
}

/// Runs a complete crawl through `renderer`
///
/// robots.txt is still fetched over plain HTTP.
pub async fn crawl_with_renderer(
    config: &Config,
    store: &mut dyn PageStore,
    resume: bool,
    renderer: Arc<dyn Renderer>,
) -> Result<CrawlReport> {
    let client = build_http_client(&config.user_agent, config.crawl.timeout_ms)?;
    Coordinator::new(config, store, renderer, client)?.run(resume).await
}
