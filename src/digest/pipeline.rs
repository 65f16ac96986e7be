use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::cluster::SimilarityClusterer;
use super::persist::DigestPersister;
use super::selector::RecentItemSelector;
use super::summarize::{ClusterSummarizer, SummaryOutcome};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{DigestSettings, SourceItem};

/// Counters for one digest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestReport {
    pub candidates: usize,
    pub clusters: usize,
    pub created: usize,
    pub reused: usize,
    pub links: usize,
    /// Clusters with no usable text or a placeholder synopsis.
    pub skipped: usize,
    /// Clusters that ran out of attempts or failed to persist.
    pub failed: usize,
}

/// Selector, clusterer, summarizer and persister wired together.
pub struct DigestPipeline {
    repo: Arc<Repository>,
    selector: RecentItemSelector,
    clusterer: SimilarityClusterer,
    summarizer: ClusterSummarizer,
    persister: DigestPersister,
}

impl DigestPipeline {
    pub fn new(
        repo: Arc<Repository>,
        clusterer: SimilarityClusterer,
        summarizer: ClusterSummarizer,
        persister: DigestPersister,
    ) -> Self {
        Self {
            selector: RecentItemSelector::new(Arc::clone(&repo)),
            repo,
            clusterer,
            summarizer,
            persister,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<DigestReport> {
        let settings = self.repo.load_digest_settings().await?;
        let items = self.selector.select(&settings, now).await?;
        if items.is_empty() {
            return Ok(DigestReport::default());
        }
        Ok(self.process(items, &settings).await)
    }

    /// Cluster, summarize and persist `items`. One cluster's failure never
    /// stops the rest.
    pub async fn process(&self, items: Vec<SourceItem>, settings: &DigestSettings) -> DigestReport {
        let partition = self.clusterer.cluster(&items, settings.compare_titles).await;
        let mut report = DigestReport {
            candidates: items.len(),
            clusters: partition.len(),
            ..DigestReport::default()
        };

        for cluster in &partition {
            let summary = match self.summarizer.summarize(&items, cluster).await {
                SummaryOutcome::Summarized(summary) => summary,
                SummaryOutcome::NoText => {
                    report.skipped += 1;
                    continue;
                }
                SummaryOutcome::Exhausted => {
                    report.failed += 1;
                    continue;
                }
            };

            match self.persister.persist(&items, &summary, settings).await {
                Ok(Some(outcome)) => {
                    if outcome.created {
                        report.created += 1;
                    } else {
                        report.reused += 1;
                    }
                    report.links += outcome.linked;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::error!("Failed to persist cluster {:?}: {}", cluster, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!("Digest run finished: {:?}", report);
        report
    }
}
