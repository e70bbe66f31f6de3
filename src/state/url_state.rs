/// URL state definitions for tracking crawl progress
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active States =====
    /// URL has been seen in a link but not yet accepted into the frontier
    Discovered,

    /// URL passed classification and waits in the frontier
    Queued,

    /// URL has been handed to a worker and is being fetched
    InFlight,

    // ===== Terminal States =====
    /// URL was fetched and a page with an HTTP status was stored
    Visited,

    /// URL was rejected by classification, robots.txt, or the depth budget
    Excluded,

    /// URL fetch failed at the network level; a synthetic page was stored
    Failed,
}

impl UrlState {
    /// Returns true if no further processing will happen for this URL
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Visited | Self::Excluded | Self::Failed)
    }

    /// Returns true if the URL may still be dispatched or is being fetched
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving from this state to `next` is a legal transition
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        use UrlState::*;
        matches!(
            (self, next),
            (Discovered, Queued)
                | (Discovered, Excluded)
                | (Queued, InFlight)
                | (Queued, Excluded)
                | (InFlight, Visited)
                | (InFlight, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Queued => "queued",
            Self::InFlight => "in-flight",
            Self::Visited => "visited",
            Self::Excluded => "excluded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
