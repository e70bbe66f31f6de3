//! Page fetching
//!
//! This module handles retrieving one URL and turning the response into a
//! [`PageSnapshot`]:
//! - Building HTTP clients with proper user agent strings
//! - The [`Renderer`] seam through which a headless backend can be injected
//! - Manual redirect handling with loop detection
//! - Error classification into [`FetchError`]

use crate::config::{CrawlConfig, RenderMode, ScreenshotMode, UserAgentConfig};
use crate::crawler::parser::parse_html;
use crate::model::PageSnapshot;
use crate::url::normalize_with_base;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one fetch
pub const MAX_REDIRECTS: usize = 10;

pub use crate::model::SYNTHETIC_FAILURE_STATUS;

/// Fetch failures that produced no HTTP response worth recording
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Redirect loop at {0}")]
    RedirectLoop(String),

    #[error("More than {max} redirects starting at {url}")]
    TooManyRedirects { url: String, max: usize },

    #[error("Invalid redirect target '{location}' from {url}")]
    InvalidRedirect { url: String, location: String },

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Render mode {0:?} is not supported by this renderer")]
    UnsupportedMode(RenderMode),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// What the crawler asks a renderer for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub mode: RenderMode,
    pub screenshots: ScreenshotMode,
}

impl RenderRequest {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            mode: config.render_mode,
            screenshots: config.screenshots,
        }
    }
}

/// A rendered response, before extraction
#[derive(Debug, Clone, Default)]
pub struct RenderedResponse {
    /// URL the content was finally served from
    pub final_url: Option<Url>,
    pub status: u16,
    /// URLs passed through before `final_url`, in order
    pub redirect_chain: Vec<String>,
    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,
    /// Body, present for HTML responses only
    pub body: Option<String>,
    /// Screenshot reference produced by the backend
    pub screenshot: Option<String>,
}

impl RenderedResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Rendering backend used by the fetcher
///
/// The default [`HttpRenderer`] performs plain HTTP fetches; a headless
/// browser backend can be injected by implementing this trait.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url, request: RenderRequest) -> Result<RenderedResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are handled manually by [`HttpRenderer`].
///
/// # Example
///
/// ```
/// use site_strata::config::UserAgentConfig;
/// use site_strata::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), 30_000).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout_ms: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms.min(10_000)))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP renderer backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
    max_redirects: usize,
}

impl HttpRenderer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_redirects: MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    /// Fetches `url`, following redirects by hand
    ///
    /// # Redirect Flow
    ///
    /// 1. GET the current URL
    /// 2. On a 3xx with a `Location`, resolve and normalize the target
    /// 3. Fail on a target already seen (loop) or after `max_redirects` hops
    /// 4. Any other status ends the chain and is returned as-is
    async fn render(&self, url: &Url, request: RenderRequest) -> Result<RenderedResponse, FetchError> {
        if request.mode != RenderMode::Static {
            return Err(FetchError::UnsupportedMode(request.mode));
        }

        let mut current = url.clone();
        let mut chain: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([current.to_string()]);

        loop {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    let next = normalize_with_base(location, &current).map_err(|_| {
                        FetchError::InvalidRedirect {
                            url: current.to_string(),
                            location: location.to_string(),
                        }
                    })?;

                    if !seen.insert(next.to_string()) {
                        return Err(FetchError::RedirectLoop(next.to_string()));
                    }
                    if chain.len() >= self.max_redirects {
                        return Err(FetchError::TooManyRedirects {
                            url: url.to_string(),
                            max: self.max_redirects,
                        });
                    }

                    tracing::debug!("Redirect {} -> {} ({})", current, next, status.as_u16());
                    chain.push(current.to_string());
                    current = next;
                    continue;
                }
            }

            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_lowercase(), v.to_string()))
                })
                .collect();

            let is_html = headers
                .get("content-type")
                .map(|ct| is_html_content_type(ct))
                .unwrap_or(true);

            let body = if is_html {
                Some(response.text().await?)
            } else {
                None
            };

            if request.screenshots != ScreenshotMode::Off {
                tracing::trace!("Screenshot requested for {}; HTTP renderer cannot capture", current);
            }

            return Ok(RenderedResponse {
                final_url: Some(current),
                status: status.as_u16(),
                redirect_chain: chain,
                headers,
                body,
                screenshot: None,
            });
        }
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Fetches one URL through `renderer` and extracts a snapshot
///
/// Non-2xx responses are returned as snapshots with their status. Non-HTML
/// responses carry status and header metadata only.
///
/// # Arguments
///
/// * `renderer` - The rendering backend
/// * `url` - The normalized URL to fetch
/// * `request` - Render mode and screenshot policy
///
/// # Returns
///
/// * `Ok(PageSnapshot)` - A response was received
/// * `Err(FetchError)` - The fetch failed below HTTP
pub async fn fetch(
    renderer: &dyn Renderer,
    url: &Url,
    request: RenderRequest,
) -> Result<PageSnapshot, FetchError> {
    let response = renderer.render(url, request).await?;
    Ok(snapshot_from_response(url, response))
}

/// Turns a rendered response into a page snapshot
pub fn snapshot_from_response(requested: &Url, response: RenderedResponse) -> PageSnapshot {
    let final_url = response.final_url.clone().unwrap_or_else(|| requested.clone());

    let mut meta = BTreeMap::new();
    for header_name in ["content-type", "last-modified"] {
        if let Some(value) = response.headers.get(header_name) {
            meta.insert(format!("http:{}", header_name), value.clone());
        }
    }

    let mut snapshot = PageSnapshot {
        final_url: final_url.to_string(),
        status: response.status,
        redirect_chain: response.redirect_chain,
        screenshot: response.screenshot,
        ..Default::default()
    };

    if let Some(body) = response.body {
        let parsed = parse_html(&body, &final_url);
        meta.extend(parsed.meta);

        snapshot.canonical = parsed.canonical;
        snapshot.title = parsed.title;
        snapshot.headings = parsed.headings;
        snapshot.lang = parsed.lang;
        snapshot.json_ld = parsed.json_ld;
        snapshot.links = parsed.links;
        snapshot.main_content = parsed.main_content;
        snapshot.content_hash = Some(parsed.content_hash);
        snapshot.word_count = parsed.word_count;
        snapshot.media_count = parsed.media_count;
        snapshot.blocks = parsed.blocks;
    }

    snapshot.meta = meta;
    snapshot
}
