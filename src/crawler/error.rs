//! Typed errors for the crawl pipeline.
//!
//! `thiserror` enums for the library surface; `anyhow` stays in the binary.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from fetching a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the hard per-request timeout.
    #[error("request timed out")]
    Timeout,

    /// Non-2xx response that is not worth retrying.
    #[error("HTTP status {0}")]
    Http(reqwest::StatusCode),

    /// Connection-level failure (DNS, TLS, reset, ...).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Retryable failures kept happening until the retry budget ran out.
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Parser construction failure. Per-node extraction problems are not errors;
/// malformed containers are skipped and logged.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid CSS selector `{0}`")]
    Selector(String),
}

/// Scheduling violations surfaced to the caller.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// At most one crawl per search may be in flight.
    #[error("a crawl is already running for search {search_id}")]
    AlreadyRunning { search_id: u64 },

    /// Forced runs must respect the cooldown since the last crawl.
    #[error("crawled too recently, retry at {retry_at}")]
    TooSoon { retry_at: DateTime<Utc> },
}

/// Listing store failure, opaque to the pipeline.
#[derive(Debug, Error)]
#[error("listing store error: {0}")]
pub struct StoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

/// Failure of a whole crawl cycle. Always routed through the scheduler's
/// failure path before reaching the caller.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The search-results page itself could not be fetched.
    #[error("search page fetch failed: {0}")]
    SearchPageFetch(#[source] FetchError),

    /// The cycle was cancelled between listing-detail fetches.
    #[error("crawl cycle cancelled")]
    Cancelled,

    /// The cycle ran past its overall deadline.
    #[error("crawl cycle exceeded deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
