//! Crawl timing policy: when a search is due, how its next run moves on
//! success and failure, and the guard that keeps a search from being crawled
//! twice at once.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::error::SchedulerError;
use crate::models::SearchDefinition;

/// Minimum time since the last crawl before a forced re-run is allowed.
const FORCED_RUN_COOLDOWN_MINUTES: i64 = 30;

pub struct Scheduler {
    in_flight: Mutex<HashSet<u64>>,
    cooldown: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
            cooldown: Duration::minutes(FORCED_RUN_COOLDOWN_MINUTES),
        }
    }

    /// Active and never crawled, or past its next scheduled time.
    pub fn is_due(&self, search: &SearchDefinition, now: DateTime<Utc>) -> bool {
        search.is_active && search.next_crawl_at.map_or(true, |at| at <= now)
    }

    /// The subset of `searches` that should be crawled now, in input order.
    pub fn due_searches<'a>(
        &self,
        searches: &'a [SearchDefinition],
        now: DateTime<Utc>,
    ) -> Vec<&'a SearchDefinition> {
        searches.iter().filter(|s| self.is_due(s, now)).collect()
    }

    /// Claim the single crawl slot for a search. The returned guard frees the
    /// slot when dropped, so a panicking cycle cannot wedge the search.
    pub fn begin(&self, search_id: u64) -> Result<RunGuard<'_>, SchedulerError> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(search_id) {
            return Err(SchedulerError::AlreadyRunning { search_id });
        }
        debug!(search_id, "crawl slot claimed");
        Ok(RunGuard {
            scheduler: self,
            search_id,
        })
    }

    /// Successful cycle: stamp the crawl and schedule the next one an
    /// interval away.
    pub fn complete_success(&self, search: &mut SearchDefinition, now: DateTime<Utc>) {
        search.last_crawled_at = Some(now);
        search.next_crawl_at = Some(now + Duration::hours(search.crawl_interval_hours));
    }

    /// Failed cycle: back off to twice the interval. The search stays active;
    /// deactivation is a user decision, never ours.
    pub fn complete_failure(&self, search: &mut SearchDefinition, now: DateTime<Utc>) {
        search.next_crawl_at = Some(now + Duration::hours(2 * search.crawl_interval_hours));
    }

    /// Gate for manual runs: due-ness is bypassed but the cooldown since the
    /// last crawl is not.
    pub fn check_forced(
        &self,
        search: &SearchDefinition,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        if let Some(last) = search.last_crawled_at {
            let retry_at = last + self.cooldown;
            if now < retry_at {
                return Err(SchedulerError::TooSoon { retry_at });
            }
        }
        Ok(())
    }
}

/// Holds the at-most-one-in-flight slot for one search.
pub struct RunGuard<'a> {
    scheduler: &'a Scheduler,
    search_id: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.scheduler.in_flight.lock() {
            in_flight.remove(&self.search_id);
        }
    }
}
