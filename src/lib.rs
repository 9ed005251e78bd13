pub mod crawler;
pub mod models;

pub use crawler::{
    CrawlConfig, CrawlOrchestrator, CycleError, FetchError, FetcherConfig, ListingNotifier,
    ListingStore, LogNotifier, MemoryListingStore, PageFetcher, PoliteFetcher, Scheduler,
};
pub use models::{
    Category, CrawlStatistics, CycleReport, FilterSettings, ListingCandidate, ListingDetail,
    ListingRecord, ListingStub, Location, MergeOutcome, SearchDefinition,
};
