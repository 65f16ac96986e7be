use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{DigestSettings, SourceItem};

/// Picks the digest candidates: unlinked items from digest-enabled sources
/// inside the lookback window, newest first.
pub struct RecentItemSelector {
    repo: Arc<Repository>,
}

impl RecentItemSelector {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn select(
        &self,
        settings: &DigestSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<SourceItem>> {
        let since = now - Duration::hours(i64::from(settings.lookback_hours.max(1)));
        let items = self
            .repo
            .recent_unlinked_items(since, settings.include_read)
            .await?;

        if items.is_empty() {
            tracing::info!("No new items to process.");
        } else {
            tracing::info!("Selected {} candidate items since {}", items.len(), since);
        }
        Ok(items)
    }
}
