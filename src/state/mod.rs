//! State module for tracking crawl progress
//!
//! Every URL the crawler learns about moves through a small state machine:
//!
//! ```text
//! discovered -> queued -> in-flight -> { visited | failed }
//!      \-----------\----------------------> excluded
//! ```
//!
//! The coordinator owns the only copy of these states; workers never see them.

mod url_state;

pub use url_state::UrlState;
