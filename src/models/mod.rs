use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bazos.sk category. Each category lives on its own subdomain, which scopes
/// the search to that section of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Auto,
    Deti,
    Dom,
    Elektro,
    Foto,
    Hudba,
    Knihy,
    Mobily,
    Motocykle,
    Nabytok,
    Pc,
    Reality,
    Sport,
    Stroje,
    Zvierata,
}

impl Category {
    pub fn subdomain(&self) -> &'static str {
        match self {
            Category::Auto => "auto",
            Category::Deti => "deti",
            Category::Dom => "dom",
            Category::Elektro => "elektro",
            Category::Foto => "foto",
            Category::Hudba => "hudba",
            Category::Knihy => "knihy",
            Category::Mobily => "mobil",
            Category::Motocykle => "motocykle",
            Category::Nabytok => "nabytok",
            Category::Pc => "pc",
            Category::Reality => "reality",
            Category::Sport => "sport",
            Category::Stroje => "stroje",
            Category::Zvierata => "zvierata",
        }
    }
}

/// Per-search filter rules applied when a listing is first discovered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    pub exclude_keywords: Vec<String>,
    pub include_keywords: Vec<String>,
    pub min_images: Option<usize>,
    pub exclude_sellers: Vec<String>,
}

/// A saved search owned by a user. Read-only while a crawl cycle runs;
/// the scheduler is the only writer of `last_crawled_at`/`next_crawl_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefinition {
    pub id: u64,
    pub query: String,
    pub category: Option<Category>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    /// Listings older than this are never surfaced. Always >= 1.
    pub max_age_days: i64,
    pub location: Option<String>,
    pub radius_km: u32,
    pub crawl_interval_hours: i64,
    pub is_active: bool,
    pub notification_enabled: bool,
    pub last_crawled_at: Option<DateTime<Utc>>,
    /// None only before the first crawl; afterwards advanced by the scheduler.
    pub next_crawl_at: Option<DateTime<Utc>>,
    pub filters: FilterSettings,
}

impl SearchDefinition {
    pub fn new(id: u64, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            category: None,
            price_min: None,
            price_max: None,
            max_age_days: 7,
            location: None,
            radius_km: 25,
            crawl_interval_hours: 2,
            is_active: true,
            notification_enabled: true,
            last_crawled_at: None,
            next_crawl_at: None,
            filters: FilterSettings::default(),
        }
    }

    /// Build the bazos.sk search-results URL for this search.
    ///
    /// The site uses a fixed query-parameter template; the category picks the
    /// subdomain, everything else goes into the query string.
    pub fn search_url(&self) -> String {
        let subdomain = self.category.map(|c| c.subdomain()).unwrap_or("www");
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("hledat", &self.query)
            .append_pair("rubriky", "www")
            .append_pair("hlokalita", self.location.as_deref().unwrap_or(""))
            .append_pair("humkreis", &self.radius_km.to_string())
            .append_pair(
                "cenaod",
                &self.price_min.map(|p| p.to_string()).unwrap_or_default(),
            )
            .append_pair(
                "cenado",
                &self.price_max.map(|p| p.to_string()).unwrap_or_default(),
            )
            .append_pair("submit", "Hľadať")
            .append_pair("order", "nejnovejsi")
            .finish();
        format!("https://{subdomain}.bazos.sk/?{query}")
    }
}

/// City and postal code split out of the raw location string on the ad.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub postal_code: String,
}

/// The subset of a listing extractable from the search-results page alone,
/// before its detail page has been fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingStub {
    /// Stable id derived from the detail URL; merge key across crawls.
    pub external_id: String,
    pub title: String,
    pub url: String,
    /// Price in whole euro; 0 when the ad shows no numeric price.
    pub price: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub location_raw: String,
    pub view_count: u32,
}

/// Everything extracted from a listing's own detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetail {
    pub description: String,
    pub images: Vec<String>,
    pub is_available: bool,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_email: Option<String>,
}

impl Default for ListingDetail {
    fn default() -> Self {
        Self {
            description: String::new(),
            images: Vec::new(),
            // a listing we could not re-check is assumed still up
            is_available: true,
            seller_name: None,
            seller_phone: None,
            seller_email: None,
        }
    }
}

/// A fully assembled listing as seen during one crawl cycle. Ephemeral;
/// becomes a [`ListingRecord`] only if the merge engine decides so.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub currency: String,
    pub location: Location,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_email: Option<String>,
    pub source_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u32,
    pub is_available: bool,
    pub images: Vec<String>,
    pub crawled_at: DateTime<Utc>,
}

impl ListingCandidate {
    pub fn from_parts(
        stub: ListingStub,
        detail: ListingDetail,
        location: Location,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            external_id: stub.external_id,
            title: stub.title,
            description: detail.description,
            price: stub.price,
            currency: "€".to_string(),
            location,
            seller_name: detail.seller_name,
            seller_phone: detail.seller_phone,
            seller_email: detail.seller_email,
            source_url: stub.url,
            published_at: stub.published_at,
            view_count: stub.view_count,
            is_available: detail.is_available,
            images: detail.images,
            crawled_at: now,
        }
    }
}

/// A persisted listing, unique per `(search_id, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub search_id: u64,
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub currency: String,
    pub location: Location,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_email: Option<String>,
    pub source_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u32,
    pub is_available: bool,
    pub images: Vec<String>,
    /// Set once when the record is created, never touched again.
    pub first_seen_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn from_candidate(search_id: u64, candidate: ListingCandidate, now: DateTime<Utc>) -> Self {
        Self {
            search_id,
            external_id: candidate.external_id,
            title: candidate.title,
            description: candidate.description,
            price: candidate.price,
            currency: candidate.currency,
            location: candidate.location,
            seller_name: candidate.seller_name,
            seller_phone: candidate.seller_phone,
            seller_email: candidate.seller_email,
            source_url: candidate.source_url,
            published_at: candidate.published_at,
            view_count: candidate.view_count,
            is_available: candidate.is_available,
            images: candidate.images,
            first_seen_at: now,
            last_checked_at: now,
        }
    }
}

/// Outcome of merging one candidate against the store.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Created(ListingRecord),
    Updated(ListingRecord),
}

/// Per-search accumulator, incremented after every completed cycle. Never reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStatistics {
    pub total_crawls: u64,
    pub total_items_found: u64,
    pub last_crawl_at: Option<DateTime<Utc>>,
    pub last_items_found_at: Option<DateTime<Utc>>,
}

impl CrawlStatistics {
    pub fn record_cycle(&mut self, items_found: usize, now: DateTime<Utc>) {
        self.total_crawls += 1;
        self.total_items_found += items_found as u64;
        self.last_crawl_at = Some(now);
        if items_found > 0 {
            self.last_items_found_at = Some(now);
        }
    }
}

/// What one crawl cycle produced, in search-page order.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub created: Vec<ListingRecord>,
    pub updated: Vec<ListingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn search_url_uses_category_subdomain_and_params() {
        let mut search = SearchDefinition::new(1, "osciloskop");
        search.category = Some(Category::Elektro);
        search.price_min = Some(50);
        search.price_max = Some(200);

        let url = search.search_url();
        assert!(url.starts_with("https://elektro.bazos.sk/?"));
        assert!(url.contains("hledat=osciloskop"));
        assert!(url.contains("cenaod=50"));
        assert!(url.contains("cenado=200"));
        assert!(url.contains("order=nejnovejsi"));
    }

    #[test]
    fn search_url_defaults_to_www_without_category() {
        let search = SearchDefinition::new(1, "stol");
        assert!(search.search_url().starts_with("https://www.bazos.sk/?"));
    }

    #[test]
    fn statistics_accumulate_and_track_last_found() {
        let mut stats = CrawlStatistics::default();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        stats.record_cycle(3, t1);
        assert_eq!(stats.total_crawls, 1);
        assert_eq!(stats.total_items_found, 3);
        assert_eq!(stats.last_items_found_at, Some(t1));

        stats.record_cycle(0, t2);
        assert_eq!(stats.total_crawls, 2);
        assert_eq!(stats.total_items_found, 3);
        assert_eq!(stats.last_crawl_at, Some(t2));
        // a crawl with nothing new must not advance last_items_found_at
        assert_eq!(stats.last_items_found_at, Some(t1));
    }
}
