use std::sync::Arc;

use chrono::Utc;

use super::summarize::ClusterSummary;
use crate::ai::Translator;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{DigestSettings, SourceItem};

const NO_SUMMARY: &str = "No summary available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub entry_id: i64,
    pub created: bool,
    /// Links added by this call. Existing pairs are not counted.
    pub linked: usize,
}

/// Writes cluster summaries and their source links.
pub struct DigestPersister {
    repo: Arc<Repository>,
    translator: Option<Arc<dyn Translator>>,
}

impl DigestPersister {
    pub fn new(repo: Arc<Repository>, translator: Option<Arc<dyn Translator>>) -> Self {
        Self { repo, translator }
    }

    /// Reuse or create the entry keyed by the first member's link, then link
    /// every member to it. Returns `None` for placeholder synopses.
    pub async fn persist(
        &self,
        items: &[SourceItem],
        summary: &ClusterSummary,
        settings: &DigestSettings,
    ) -> Result<Option<PersistOutcome>> {
        let Some(representative) = summary.members.first().and_then(|&i| items.get(i)) else {
            tracing::error!("Cluster summary without a resolvable member, skipping");
            return Ok(None);
        };
        if summary.synopsis.trim() == NO_SUMMARY {
            tracing::info!(
                "Skipping article with 'No summary available': {}",
                representative.link
            );
            return Ok(None);
        }

        let mut synopsis = summary.synopsis.clone();
        if settings.translate {
            if let Some(translator) = &self.translator {
                // Existing entries keep their text, so only new ones are translated.
                if self.repo.find_digest_by_link(&representative.link).await?.is_none() {
                    synopsis = match translator.translate(&synopsis, &settings.language).await {
                        Ok(translated) => translated,
                        Err(e) => {
                            tracing::warn!("Translation failed, keeping original text: {e}");
                            synopsis
                        }
                    };
                }
            }
        }

        let stored = self
            .repo
            .upsert_digest_entry(
                synopsis,
                representative.link.clone(),
                summary.image.clone(),
                representative.published_at.unwrap_or_else(Utc::now),
            )
            .await?;
        if stored.created {
            tracing::info!("Created new digest entry with id: {}", stored.entry.id);
        } else {
            tracing::info!("Using existing digest entry with id: {}", stored.entry.id);
        }

        let item_ids: Vec<i64> = summary
            .members
            .iter()
            .filter_map(|&i| items.get(i).map(|item| item.id))
            .collect();
        let linked = self.repo.link_items(stored.entry.id, item_ids).await?;
        tracing::debug!("Linked {linked} items to digest entry {}", stored.entry.id);

        Ok(Some(PersistOutcome {
            entry_id: stored.entry.id,
            created: stored.created,
            linked,
        }))
    }
}
