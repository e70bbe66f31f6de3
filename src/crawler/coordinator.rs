//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator is the only writer of crawl state. It owns:
//! - The frontier queue and the per-URL state map (the visited set)
//! - The page store
//! - The robots.txt cache
//!
//! Fetching happens on a fixed pool of worker tasks. Jobs go out over one
//! channel and fetch events come back over another; workers never touch the
//! store or the frontier.

use crate::config::Config;
use crate::crawler::fetcher::{fetch, FetchError, RenderRequest, Renderer};
use crate::crawler::scheduler::{Frontier, QueuedUrl, Throttle};
use crate::model::{Page, PageSnapshot};
use crate::robots::{fetch_robots, origin_key, RobotsCache};
use crate::state::UrlState;
use crate::storage::{PageStore, RunStatus, META_BASE_URL, META_LAST_CRAWL};
use crate::url::{normalize_url, page_id, CrawlScope};
use crate::{Result, StrataError};
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use url::Url;

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Pages stored during this run, failures included
    pub fetched: u64,

    /// Pages stored during this run with a 2xx status
    pub successful: u64,

    /// Fetches that failed below HTTP
    pub failed: u64,

    /// URLs kept out by scope rules, depth, or an out-of-scope redirect
    pub excluded: u64,

    /// URLs kept out by robots.txt
    pub robots_denied: u64,

    /// Successful pages in the store when the run ended, earlier runs included
    pub stored_successful: u64,

    pub elapsed: Duration,

    /// Whether the run stopped on a cancellation request
    pub cancelled: bool,
}

/// A URL handed to a worker
#[derive(Debug, Clone)]
struct FetchJob {
    url: Url,
    depth: u32,
}

/// What a worker sends back for one job
#[derive(Debug)]
struct FetchEvent {
    job: FetchJob,
    result: std::result::Result<PageSnapshot, FetchError>,
}

/// Main crawler coordinator structure
pub struct Coordinator<'a> {
    config: &'a Config,
    store: &'a mut dyn PageStore,
    scope: CrawlScope,
    renderer: Arc<dyn Renderer>,
    client: Client,
    throttle: Throttle,
    robots: RobotsCache,
    frontier: Frontier,
    states: HashMap<String, UrlState>,
    beyond_depth: HashSet<String>,
    config_hash: String,
    cancel: Arc<AtomicBool>,
    report: CrawlReport,
}

impl<'a> Coordinator<'a> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `store` - The page store the crawl writes to
    /// * `renderer` - The rendering backend handed to every worker
    /// * `client` - HTTP client used for robots.txt
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(StrataError)` - The crawl scope could not be compiled
    pub fn new(
        config: &'a Config,
        store: &'a mut dyn PageStore,
        renderer: Arc<dyn Renderer>,
        client: Client,
    ) -> Result<Self> {
        let scope = CrawlScope::new(&config.crawl)?;
        let throttle = Throttle::new(Duration::from_millis(config.crawl.throttle));

        Ok(Self {
            config,
            store,
            scope,
            renderer,
            client,
            throttle,
            robots: RobotsCache::new(),
            frontier: Frontier::new(),
            states: HashMap::new(),
            beyond_depth: HashSet::new(),
            config_hash: String::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            report: CrawlReport::default(),
        })
    }

    /// Records `hash` as the configuration hash of the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Uses `flag` for cooperative cancellation
    ///
    /// Once set, no further fetches are dispatched; in-flight fetches drain
    /// and are stored.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Runs the crawl to completion
    ///
    /// 1. Clear the store (fresh) or pre-seed the visited set (resume)
    /// 2. Spawn `concurrency` workers
    /// 3. Dispatch while the page budget allows, store every result,
    ///    enqueue its links at depth + 1
    /// 4. Stop when the frontier is empty and nothing is in flight
    /// 5. Record the run and crawl metadata
    pub async fn run(mut self, resume: bool) -> Result<CrawlReport> {
        let start = Instant::now();

        if resume {
            self.seed_from_store()?;
        } else {
            self.store.clear()?;
            tracing::info!("Cleared page store for fresh crawl");
        }

        let base = self.scope.base().clone();
        if !self.states.contains_key(base.as_str()) {
            self.admit_to_frontier(base, 0);
        }

        let run_id = self.store.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting crawl run {} of {} ({} queued)",
            run_id,
            self.scope.base(),
            self.frontier.len()
        );

        let result = self.crawl_loop().await;

        let status = match &result {
            Ok(()) if self.report.cancelled => RunStatus::Interrupted,
            Ok(()) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };
        self.store.finish_run(run_id, status, self.report.fetched)?;
        result?;

        self.report.excluded += self
            .beyond_depth
            .iter()
            .filter(|url| !self.states.contains_key(*url))
            .count() as u64;
        self.report.stored_successful = self.store.count_successful()?;
        self.report.elapsed = start.elapsed();

        self.store.set_meta(
            META_LAST_CRAWL,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        self.store.set_meta(META_BASE_URL, self.scope.base().as_str())?;

        tracing::info!(
            "Crawl completed: {} pages stored ({} successful, {} failed), {} excluded, {} denied by robots.txt in {:?}",
            self.report.fetched,
            self.report.successful,
            self.report.failed,
            self.report.excluded,
            self.report.robots_denied,
            self.report.elapsed
        );

        Ok(self.report)
    }

    async fn crawl_loop(&mut self) -> Result<()> {
        let concurrency = self.config.crawl.concurrency.max(1) as usize;
        let max_pages = u64::from(self.config.crawl.max_pages);
        let request = RenderRequest::from_config(&self.config.crawl);

        let (job_tx, job_rx) = mpsc::channel::<FetchJob>(concurrency);
        let (event_tx, mut event_rx) = mpsc::channel::<FetchEvent>(concurrency);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers: Vec<JoinHandle<()>> = (0..concurrency)
            .map(|id| {
                spawn_worker(
                    id,
                    self.renderer.clone(),
                    job_rx.clone(),
                    event_tx.clone(),
                    self.throttle.clone(),
                    request,
                )
            })
            .collect();
        drop(event_tx);

        let mut successful = self.store.count_successful()?;
        let mut in_flight: usize = 0;
        let mut progress_mark = 0u64;

        loop {
            // Dispatch
            while in_flight < concurrency
                && successful + (in_flight as u64) < max_pages
                && !self.cancelled()
            {
                let Some(queued) = self.frontier.pop() else {
                    break;
                };
                if self.states.get(queued.url.as_str()) != Some(&UrlState::Queued) {
                    // Already reached through a redirect
                    continue;
                }
                if !self.ready_for_dispatch(&queued).await? {
                    continue;
                }

                self.transition(queued.url.as_str(), UrlState::InFlight)?;
                let job = FetchJob {
                    url: queued.url,
                    depth: queued.depth,
                };
                job_tx.send(job).await.map_err(|_| StrataError::WorkerPool)?;
                in_flight += 1;
            }

            if in_flight == 0 {
                if self.cancelled() {
                    tracing::info!("Crawl cancelled; {} URLs left in frontier", self.frontier.len());
                    self.report.cancelled = true;
                } else if successful >= max_pages {
                    tracing::info!("Reached max-pages ({}), stopping", max_pages);
                } else {
                    tracing::info!("Frontier is empty, crawl complete");
                }
                break;
            }

            let event = event_rx.recv().await.ok_or(StrataError::WorkerPool)?;
            in_flight -= 1;
            self.handle_event(event)?;
            successful = self.store.count_successful()?;

            if self.report.fetched >= progress_mark + 10 {
                progress_mark = self.report.fetched;
                tracing::info!(
                    "Progress: {} pages stored, {} in frontier, {} in flight",
                    self.report.fetched,
                    self.frontier.len(),
                    in_flight
                );
            }
        }

        drop(job_tx);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("Fetch worker ended abnormally: {}", e);
            }
        }

        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Final checks before a queued URL is handed to a worker
    async fn ready_for_dispatch(&mut self, queued: &QueuedUrl) -> Result<bool> {
        if self.config.crawl.respect_robots && !self.robots_allow(&queued.url).await {
            tracing::debug!("URL {} disallowed by robots.txt", queued.url);
            self.transition(queued.url.as_str(), UrlState::Excluded)?;
            self.report.robots_denied += 1;
            return Ok(false);
        }

        Ok(true)
    }

    /// Checks robots.txt for `url`, fetching it once per origin
    async fn robots_allow(&mut self, url: &Url) -> bool {
        let config = self.config;
        let agent = &config.user_agent.crawler_name;
        let origin = origin_key(url);

        if self.robots.get(&origin).is_none() {
            tracing::debug!("Fetching robots.txt for {}", origin);
            let rules = fetch_robots(&self.client, url).await;
            if let Some(delay) = rules.crawl_delay(agent) {
                self.throttle.raise_to(delay).await;
            }
            self.robots.insert(origin.clone(), rules);
        }

        self.robots
            .get(&origin)
            .map(|cached| cached.rules.is_allowed(url.as_str(), agent))
            .unwrap_or(true)
    }

    fn handle_event(&mut self, event: FetchEvent) -> Result<()> {
        let FetchEvent { job, result } = event;

        match result {
            Ok(snapshot) => self.record_snapshot(job, snapshot),
            Err(error) => {
                tracing::warn!("Fetch failed for {}: {}", job.url, error);
                let page = Page::failed(
                    page_id(&job.url),
                    job.url.to_string(),
                    job.depth,
                    error.to_string(),
                );
                self.store.upsert(&page)?;
                self.transition(job.url.as_str(), UrlState::Failed)?;
                self.report.fetched += 1;
                self.report.failed += 1;
                Ok(())
            }
        }
    }

    fn record_snapshot(&mut self, job: FetchJob, mut snapshot: PageSnapshot) -> Result<()> {
        self.transition(job.url.as_str(), UrlState::Visited)?;

        let final_url = normalize_url(&snapshot.final_url).unwrap_or_else(|_| job.url.clone());
        for hop in snapshot.redirect_chain.iter().chain([&snapshot.final_url]) {
            self.mark_visited(hop);
        }
        self.mark_visited(final_url.as_str());

        if final_url != job.url && !self.scope.classify(&final_url).in_frontier {
            tracing::debug!(
                "{} redirected out of scope to {}, not stored",
                job.url,
                final_url
            );
            self.report.excluded += 1;
            return Ok(());
        }

        snapshot.final_url = final_url.to_string();
        let page = Page::from_snapshot(page_id(&final_url), snapshot, job.depth);
        tracing::debug!("Stored {} ({}, {} links)", page.url, page.status, page.links.len());

        self.store.upsert(&page)?;
        self.report.fetched += 1;
        if page.is_success() {
            self.report.successful += 1;
        }

        for link in &page.links {
            self.consider_link(&link.url, job.depth + 1);
        }

        Ok(())
    }

    /// Classifies a discovered link and queues it when admissible
    fn consider_link(&mut self, link: &str, depth: u32) {
        if self.states.contains_key(link) {
            return;
        }

        let url = match normalize_url(link) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unparseable link {}: {}", link, e);
                return;
            }
        };
        if self.states.contains_key(url.as_str()) {
            return;
        }

        if depth > self.config.crawl.max_depth {
            // Not final: a shallower path may still reach it
            self.beyond_depth.insert(url.to_string());
            return;
        }

        let classification = self.scope.classify(&url);
        if classification.in_frontier {
            self.admit_to_frontier(url, depth);
        } else {
            tracing::trace!("Excluded {}: {}", url, classification.reason);
            self.states.insert(url.to_string(), UrlState::Excluded);
            self.report.excluded += 1;
        }
    }

    fn admit_to_frontier(&mut self, url: Url, depth: u32) {
        self.states.insert(url.to_string(), UrlState::Queued);
        self.frontier.push(url, depth);
    }

    /// Marks a URL reached directly or through a redirect
    ///
    /// URLs still waiting in the frontier are settled too; in-flight and
    /// terminal states are left alone.
    fn mark_visited(&mut self, url: &str) {
        match self.states.get(url) {
            None | Some(UrlState::Discovered) | Some(UrlState::Queued) => {
                self.states.insert(url.to_string(), UrlState::Visited);
            }
            Some(_) => {}
        }
    }

    /// Moves `url` to `next`, rejecting illegal transitions
    fn transition(&mut self, url: &str, next: UrlState) -> Result<()> {
        let current = self.states.get(url).copied().unwrap_or(UrlState::Discovered);
        if !current.can_transition_to(next) {
            return Err(StrataError::InvalidTransition {
                url: url.to_string(),
                from: current,
                to: next,
            });
        }
        self.states.insert(url.to_string(), next);
        Ok(())
    }

    /// Rebuilds the visited set and the frontier from a previous run
    fn seed_from_store(&mut self) -> Result<()> {
        let pages = self.store.all()?;

        for page in &pages {
            self.mark_visited(&page.url);
            for hop in &page.redirect_chain {
                self.mark_visited(hop);
            }
        }

        for page in &pages {
            for link in &page.links {
                self.consider_link(&link.url, page.depth + 1);
            }
        }

        // Exclusions counted while seeding belong to earlier runs
        self.report.excluded = 0;

        tracing::info!(
            "Resuming: {} pages already stored, {} URLs queued",
            pages.len(),
            self.frontier.len()
        );
        Ok(())
    }
}

/// Spawns one fetch worker
///
/// The worker pulls jobs from the shared receiver until it is closed,
/// waits for its throttle slot, fetches, and reports back.
fn spawn_worker(
    worker_id: usize,
    renderer: Arc<dyn Renderer>,
    jobs: Arc<Mutex<mpsc::Receiver<FetchJob>>>,
    events: mpsc::Sender<FetchEvent>,
    throttle: Throttle,
    request: RenderRequest,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let job = {
                let mut rx = jobs.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                break;
            };

            throttle.wait().await;
            tracing::debug!("Worker {} fetching {}", worker_id, job.url);
            let result = fetch(renderer.as_ref(), &job.url, request).await;

            if events.send(FetchEvent { job, result }).await.is_err() {
                break;
            }
        }
        tracing::trace!("Worker {} exiting", worker_id);
    })
}
