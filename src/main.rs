use std::sync::Arc;

use bazos_scout::crawler::{CrawlConfig, CrawlOrchestrator, LogNotifier, MemoryListingStore};
use bazos_scout::crawler::{FetcherConfig, PoliteFetcher};
use bazos_scout::models::{Category, CrawlStatistics, SearchDefinition};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Bazos Scout - saved-search crawler");

    // A demo search: oscilloscopes in the electronics category
    let mut search = SearchDefinition::new(1, "osciloskop");
    search.category = Some(Category::Elektro);
    search.price_min = Some(50);
    search.price_max = Some(200);
    search.max_age_days = 3;

    let fetcher = PoliteFetcher::new(FetcherConfig::default())?;
    let orchestrator = CrawlOrchestrator::new(
        fetcher,
        MemoryListingStore::new(),
        Arc::new(LogNotifier),
        CrawlConfig::default(),
    )?;

    let mut stats = CrawlStatistics::default();
    let cancel = CancellationToken::new();

    info!("Crawling: {}", search.search_url());
    let report = orchestrator
        .run_cycle(&mut search, &mut stats, &cancel)
        .await?;

    info!(
        "Cycle done: {} new, {} updated",
        report.created.len(),
        report.updated.len()
    );

    for (i, listing) in report.created.iter().enumerate() {
        println!("{}. {} ({} {})", i + 1, listing.title, listing.price, listing.currency);
        println!("   {} {}", listing.location.city, listing.location.postal_code);
        println!("   {}", listing.source_url);
        println!();
    }

    // Save the cycle's new listings for inspection
    let json = serde_json::to_string_pretty(&report.created)?;
    tokio::fs::write("found_listings.json", json).await?;
    info!("Saved new listings to found_listings.json");

    info!(
        "Next crawl scheduled at {:?}",
        search.next_crawl_at.map(|t| t.to_rfc3339())
    );

    Ok(())
}
