use serde::Deserialize;

/// Main configuration structure for Site-Strata
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Per-run crawl policy
///
/// Immutable once loaded; the coordinator and every worker read the same copy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Site entry point; also defines the crawl origin
    pub base_url: String,

    /// Maximum number of successfully fetched pages kept in the store
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum link depth from the base URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Regular expressions over the full URL; when non-empty one must match
    #[serde(default)]
    pub include: Vec<String>,

    /// Regular expressions over the full URL; any match excludes the URL
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Path globs (`*`, `**`, `?`) whose matches are never crawled
    #[serde(default)]
    pub exclude_paths: Vec<String>,

    /// Follow links to other hosts under the same root domain
    #[serde(default)]
    pub follow_subdomains: bool,

    /// Subdomains permitted when following subdomains (empty = all)
    #[serde(default)]
    pub allowed_subdomains: Vec<String>,

    #[serde(default)]
    pub render_mode: RenderMode,

    #[serde(default)]
    pub screenshots: ScreenshotMode,

    /// Minimum spacing between fetch starts, across all workers (milliseconds)
    #[serde(default = "default_throttle")]
    pub throttle: u64,

    /// Number of fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Per-request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// How pages are rendered before extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Plain HTTP fetch of the server response
    #[default]
    Static,
    /// Rendered by an injected headless backend
    Headless,
}

/// Screenshot capture policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotMode {
    #[default]
    Off,
    Viewport,
    FullPage,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteStrata".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

/// Page store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

/// Tuning knobs for the content-model inference phases
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AnalysisConfig {
    /// Minimum average similarity for two clusters to merge
    pub cluster_threshold: f64,

    /// Hard cap on reported page types (including the catch-all)
    pub max_clusters: usize,

    /// Clusters below this size are folded into the catch-all type
    pub min_cluster_size: usize,

    /// Fraction of pages a link must appear on to count as navigation
    pub nav_threshold: f64,

    /// Relationships below this confidence are dropped
    pub relationship_threshold: f64,

    /// Minimum number of distinct pages a fragment must recur on
    pub object_min_pages: usize,

    /// Signature similarity for merging fragment groups
    pub object_similarity: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cluster_threshold: 0.7,
            max_clusters: 20,
            min_cluster_size: 2,
            nav_threshold: 0.5,
            relationship_threshold: 0.3,
            object_min_pages: 2,
            object_similarity: 0.75,
        }
    }
}

fn default_max_pages() -> u32 {
    500
}

fn default_max_depth() -> u32 {
    5
}

fn default_throttle() -> u64 {
    250
}

fn default_concurrency() -> u32 {
    4
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl CrawlConfig {
    /// Builds a configuration for `base_url` with every other option at its default
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            include: Vec::new(),
            exclude: Vec::new(),
            exclude_paths: Vec::new(),
            follow_subdomains: false,
            allowed_subdomains: Vec::new(),
            render_mode: RenderMode::default(),
            screenshots: ScreenshotMode::default(),
            throttle: default_throttle(),
            concurrency: default_concurrency(),
            respect_robots: true,
            timeout_ms: default_timeout_ms(),
        }
    }
}
