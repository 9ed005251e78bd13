//! Notification seam. Delivery (email, push, ...) lives outside the
//! pipeline; from here it is fire-and-forget.

use async_trait::async_trait;
use tracing::info;

use crate::models::{ListingRecord, SearchDefinition};

/// Told about newly created listings after a cycle. Implementations own their
/// delivery failures; the pipeline never sees them.
#[async_trait]
pub trait ListingNotifier: Send + Sync {
    async fn notify_new_listings(&self, search: &SearchDefinition, created: &[ListingRecord]);
}

/// Logs new listings instead of delivering anywhere. Used by the demo binary.
pub struct LogNotifier;

#[async_trait]
impl ListingNotifier for LogNotifier {
    async fn notify_new_listings(&self, search: &SearchDefinition, created: &[ListingRecord]) {
        info!(
            search_id = search.id,
            query = %search.query,
            count = created.len(),
            "new listings found"
        );
        for record in created {
            info!(
                title = %record.title,
                price = record.price,
                url = %record.source_url,
                "  new listing"
            );
        }
    }
}
