//! Reconciling parsed candidates against previously seen listings.
//!
//! The merge engine is the sole authority on create-vs-update. Filters gate
//! only the creation of new records; a listing that was accepted once keeps
//! being refreshed even if the search's filters would reject it today.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::StoreError;
use super::filter;
use crate::models::{ListingCandidate, ListingRecord, MergeOutcome, SearchDefinition};

/// Persistence seam for listing records, keyed by `(search_id, external_id)`.
///
/// `upsert` must treat the key as the atomic unit of update so concurrent
/// merges for different keys never interfere.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get(
        &self,
        search_id: u64,
        external_id: &str,
    ) -> Result<Option<ListingRecord>, StoreError>;

    async fn upsert(&self, record: ListingRecord) -> Result<(), StoreError>;

    async fn count_for_search(&self, search_id: u64) -> Result<usize, StoreError>;
}

/// In-memory store for tests and the demo binary.
#[derive(Default)]
pub struct MemoryListingStore {
    records: RwLock<HashMap<(u64, String), ListingRecord>>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn get(
        &self,
        search_id: u64,
        external_id: &str,
    ) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .get(&(search_id, external_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, record: ListingRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap()
            .insert((record.search_id, record.external_id.clone()), record);
        Ok(())
    }

    async fn count_for_search(&self, search_id: u64) -> Result<usize, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .keys()
            .filter(|(id, _)| *id == search_id)
            .count())
    }
}

/// Merge one candidate into the store.
///
/// Known listing: refresh the volatile fields and `last_checked_at`; the
/// image list only when the candidate actually brought images, so a detail
/// page that failed to load never erases previously captured photos.
/// Unknown listing: the filter decides whether it becomes a record at all.
/// Returns `None` for candidates filtered out before creation.
pub async fn merge<S: ListingStore + ?Sized>(
    candidate: ListingCandidate,
    search: &SearchDefinition,
    store: &S,
    now: DateTime<Utc>,
) -> Result<Option<MergeOutcome>, StoreError> {
    if let Some(mut record) = store.get(search.id, &candidate.external_id).await? {
        record.title = candidate.title;
        record.description = candidate.description;
        record.price = candidate.price;
        record.location = candidate.location;
        record.seller_name = candidate.seller_name;
        record.seller_phone = candidate.seller_phone;
        record.seller_email = candidate.seller_email;
        record.view_count = candidate.view_count;
        record.is_available = candidate.is_available;
        if !candidate.images.is_empty() {
            record.images = candidate.images;
        }
        record.last_checked_at = now;

        store.upsert(record.clone()).await?;
        debug!(search_id = search.id, external_id = %record.external_id, "refreshed known listing");
        return Ok(Some(MergeOutcome::Updated(record)));
    }

    if !filter::passes(&candidate, search, now) {
        debug!(search_id = search.id, external_id = %candidate.external_id, "candidate rejected by filters");
        return Ok(None);
    }

    let record = ListingRecord::from_candidate(search.id, candidate, now);
    store.upsert(record.clone()).await?;
    debug!(search_id = search.id, external_id = %record.external_id, "created new listing");
    Ok(Some(MergeOutcome::Created(record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(id: &str) -> ListingCandidate {
        ListingCandidate {
            external_id: id.into(),
            title: "Predám osciloskop".into(),
            description: "Funkčný.".into(),
            price: 120,
            currency: "€".into(),
            location: Location::default(),
            seller_name: None,
            seller_phone: None,
            seller_email: None,
            source_url: format!("https://bazos.sk/inzerat/{id}/x.php"),
            published_at: Some(now()),
            view_count: 10,
            is_available: true,
            images: vec!["https://www.bazos.sk/img/1/1.jpg".into()],
            crawled_at: now(),
        }
    }

    #[tokio::test]
    async fn first_sighting_creates_second_updates() {
        let store = MemoryListingStore::new();
        let search = SearchDefinition::new(1, "osciloskop");

        let outcome = merge(candidate("7"), &search, &store, now()).await.unwrap();
        assert!(matches!(outcome, Some(MergeOutcome::Created(_))));

        let later = now() + Duration::hours(2);
        let mut c = candidate("7");
        c.price = 100;
        c.view_count = 25;
        let outcome = merge(c, &search, &store, later).await.unwrap();
        match outcome {
            Some(MergeOutcome::Updated(record)) => {
                assert_eq!(record.price, 100);
                assert_eq!(record.view_count, 25);
                assert_eq!(record.first_seen_at, now());
                assert_eq!(record.last_checked_at, later);
            }
            other => panic!("expected update, got {other:?}"),
        }

        assert_eq!(store.count_for_search(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_image_list_never_erases_existing_images() {
        let store = MemoryListingStore::new();
        let search = SearchDefinition::new(1, "osciloskop");

        let mut c = candidate("7");
        c.images = vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()];
        merge(c, &search, &store, now()).await.unwrap();

        let mut c = candidate("7");
        c.images = vec![];
        merge(c, &search, &store, now()).await.unwrap();

        let record = store.get(1, "7").await.unwrap().unwrap();
        assert_eq!(record.images.len(), 3);
    }

    #[tokio::test]
    async fn filter_gates_creation_but_not_updates() {
        let store = MemoryListingStore::new();
        let mut search = SearchDefinition::new(1, "osciloskop");

        // known record first, while filters still accept it
        merge(candidate("7"), &search, &store, now()).await.unwrap();

        // now exclude everything
        search.filters.exclude_keywords = vec!["osciloskop".into()];

        // the known listing is still refreshed
        let outcome = merge(candidate("7"), &search, &store, now()).await.unwrap();
        assert!(matches!(outcome, Some(MergeOutcome::Updated(_))));

        // a new one is rejected and never persisted
        let outcome = merge(candidate("8"), &search, &store, now()).await.unwrap();
        assert!(outcome.is_none());
        assert!(store.get(1, "8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn searches_do_not_share_records() {
        let store = MemoryListingStore::new();
        let search_a = SearchDefinition::new(1, "osciloskop");
        let search_b = SearchDefinition::new(2, "osciloskop");

        let a = merge(candidate("7"), &search_a, &store, now()).await.unwrap();
        let b = merge(candidate("7"), &search_b, &store, now()).await.unwrap();
        assert!(matches!(a, Some(MergeOutcome::Created(_))));
        assert!(matches!(b, Some(MergeOutcome::Created(_))));
        assert_eq!(store.count_for_search(1).await.unwrap(), 1);
        assert_eq!(store.count_for_search(2).await.unwrap(), 1);
    }
}
