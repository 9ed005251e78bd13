pub mod error;
pub mod fetcher;
pub mod filter;
pub mod merge;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod parser;
pub mod scheduler;

pub use error::{CycleError, FetchError, ParseError, SchedulerError, StoreError};
pub use fetcher::{FetcherConfig, PageFetcher, PoliteFetcher};
pub use merge::{ListingStore, MemoryListingStore};
pub use notify::{ListingNotifier, LogNotifier};
pub use orchestrator::{CrawlConfig, CrawlOrchestrator};
pub use scheduler::Scheduler;
