//! One crawl cycle end-to-end: fetch the search page, walk each listing's
//! detail page, normalize, merge, then advance the schedule and statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::CycleError;
use super::fetcher::PageFetcher;
use super::merge::{self, ListingStore};
use super::normalize;
use super::notify::ListingNotifier;
use super::parser::{DetailPageParser, SearchPageParser};
use super::scheduler::Scheduler;
use crate::models::{
    CrawlStatistics, CycleReport, ListingCandidate, ListingDetail, MergeOutcome, SearchDefinition,
};

/// Orchestrator knobs. Fetch behaviour is configured on the fetcher itself.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard bound on one whole cycle, checked between detail fetches.
    pub cycle_deadline: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            cycle_deadline: Duration::from_secs(300),
        }
    }
}

/// Drives crawl cycles for search definitions. Owns the candidate list while
/// a cycle is in flight; the store and scheduler are the only writers of
/// their respective state.
pub struct CrawlOrchestrator<F, S> {
    fetcher: F,
    store: S,
    scheduler: Scheduler,
    search_parser: SearchPageParser,
    detail_parser: DetailPageParser,
    notifier: Arc<dyn ListingNotifier>,
    config: CrawlConfig,
}

impl<F, S> CrawlOrchestrator<F, S>
where
    F: PageFetcher,
    S: ListingStore,
{
    pub fn new(
        fetcher: F,
        store: S,
        notifier: Arc<dyn ListingNotifier>,
        config: CrawlConfig,
    ) -> Result<Self, super::error::ParseError> {
        Ok(Self {
            fetcher,
            store,
            scheduler: Scheduler::new(),
            search_parser: SearchPageParser::new()?,
            detail_parser: DetailPageParser::new()?,
            notifier,
            config,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one cycle for a due search. Inactive searches are a silent no-op:
    /// no schedule movement, no statistics.
    pub async fn run_cycle(
        &self,
        search: &mut SearchDefinition,
        stats: &mut CrawlStatistics,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        if !search.is_active {
            debug!(search_id = search.id, "skipping inactive search");
            return Ok(CycleReport::default());
        }

        let _guard = self.scheduler.begin(search.id)?;

        info!(search_id = search.id, query = %search.query, "starting crawl cycle");
        match self.crawl(search, cancel).await {
            Ok(report) => {
                let now = Utc::now();
                self.scheduler.complete_success(search, now);
                stats.record_cycle(report.created.len(), now);

                info!(
                    search_id = search.id,
                    created = report.created.len(),
                    updated = report.updated.len(),
                    "crawl cycle completed"
                );

                if !report.created.is_empty() && search.notification_enabled {
                    self.notifier
                        .notify_new_listings(search, &report.created)
                        .await;
                }
                Ok(report)
            }
            Err(err) => {
                // every unrecovered failure backs the schedule off before
                // reaching the caller
                warn!(search_id = search.id, %err, "crawl cycle failed");
                self.scheduler.complete_failure(search, Utc::now());
                Err(err)
            }
        }
    }

    /// Manual trigger: skips due-gating but enforces the scheduler cooldown.
    pub async fn run_forced(
        &self,
        search: &mut SearchDefinition,
        stats: &mut CrawlStatistics,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        self.scheduler.check_forced(search, Utc::now())?;
        self.run_cycle(search, stats, cancel).await
    }

    async fn crawl(
        &self,
        search: &SearchDefinition,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        let started = Instant::now();

        let url = search.search_url();
        debug!(search_id = search.id, %url, "fetching search page");
        let html = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(CycleError::SearchPageFetch)?;

        let stubs = self
            .search_parser
            .parse(&html, search.max_age_days, Utc::now());
        debug!(search_id = search.id, stubs = stubs.len(), "parsed search page");

        let mut report = CycleReport::default();
        for stub in stubs {
            if cancel.is_cancelled() {
                return Err(CycleError::Cancelled);
            }
            if started.elapsed() > self.config.cycle_deadline {
                return Err(CycleError::DeadlineExceeded(self.config.cycle_deadline));
            }

            // a failed detail fetch only costs us that listing's detail
            // fields; the stub alone is still worth recording
            let detail = match self.fetcher.fetch(&stub.url).await {
                Ok(page) => self.detail_parser.parse(&page),
                Err(err) => {
                    warn!(url = %stub.url, %err, "detail fetch failed, keeping partial data");
                    ListingDetail::default()
                }
            };

            let now = Utc::now();
            let location = normalize::parse_location(&stub.location_raw);
            let candidate = ListingCandidate::from_parts(stub, detail, location, now);

            match merge::merge(candidate, search, &self.store, now).await? {
                Some(MergeOutcome::Created(record)) => report.created.push(record),
                Some(MergeOutcome::Updated(record)) => report.updated.push(record),
                None => {}
            }
        }

        Ok(report)
    }
}
