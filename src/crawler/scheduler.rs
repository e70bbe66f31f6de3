//! Frontier queue and fetch throttling
//!
//! This module handles:
//! - FIFO frontier management with per-URL depth
//! - Global spacing of fetch starts
//! - Raising the spacing to a robots.txt crawl delay

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the base URL
    pub depth: u32,
}

/// Breadth-first frontier
///
/// A URL is queued at most once per run; the first (shallowest) discovery
/// wins.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
    queued: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a URL to the back of the frontier
    ///
    /// # Returns
    ///
    /// `false` if the URL was already queued during this run
    pub fn push(&mut self, url: Url, depth: u32) -> bool {
        if !self.queued.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(QueuedUrl { url, depth });
        true
    }

    pub fn pop(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    /// Whether the URL has ever been queued during this run
    pub fn was_queued(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Global throttle spacing fetch starts
///
/// Shared by all workers; each call to [`Throttle::wait`] reserves the next
/// start slot, so starts are at least `interval` apart across the pool.
#[derive(Debug, Clone)]
pub struct Throttle {
    inner: Arc<Mutex<ThrottleState>>,
}

#[derive(Debug)]
struct ThrottleState {
    interval: Duration,
    next_start: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ThrottleState {
                interval,
                next_start: None,
            })),
        }
    }

    /// Waits for the next free start slot
    pub async fn wait(&self) {
        let slot = {
            let mut state = self.inner.lock().await;
            let now = Instant::now();
            let slot = match state.next_start {
                Some(next) if next > now => next,
                _ => now,
            };
            state.next_start = Some(slot + state.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    /// Raises the spacing to `delay` if it is larger than the current one
    ///
    /// # Returns
    ///
    /// `true` if the interval changed
    pub async fn raise_to(&self, delay: Duration) -> bool {
        let mut state = self.inner.lock().await;
        if delay > state.interval {
            tracing::info!(
                "Raising throttle from {:?} to {:?} (robots.txt crawl-delay)",
                state.interval,
                delay
            );
            state.interval = delay;
            true
        } else {
            false
        }
    }

    pub async fn interval(&self) -> Duration {
        self.inner.lock().await.interval
    }
}
