use std::sync::Arc;

use futures::future::join_all;

use super::extract::{clean_text, extractive_summary, first_image};
use crate::ai::GenerativeSummarizer;
use crate::error::AppError;
use crate::models::SourceItem;
use crate::services::FullTextFetcher;

/// Generative attempts per cluster before it is skipped.
pub const SUMMARY_ATTEMPTS: usize = 12;
const MERGED_SENTENCES: usize = 20;
const SINGLE_SENTENCES: usize = 10;

/// A synopsis for one cluster, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Indices of the members whose text went into the synopsis, in
    /// cluster order. The first one is the representative.
    pub members: Vec<usize>,
    pub synopsis: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summarized(ClusterSummary),
    /// No member text could be fetched, or it reduced to nothing.
    NoText,
    /// Every generative attempt failed.
    Exhausted,
}

/// Call `summarizer` up to `max_attempts` times. Both the missing-JSON
/// sentinel and transport errors use up an attempt.
pub async fn generate_with_retry(
    summarizer: &dyn GenerativeSummarizer,
    title: &str,
    text: &str,
    max_attempts: usize,
) -> Option<String> {
    for attempt in 1..=max_attempts {
        match summarizer.summarize(title, text).await {
            Ok(summary) => return Some(summary),
            Err(AppError::NoStructuredContent) => {
                tracing::warn!("Retrying due to missing JSON object, attempt {attempt}");
            }
            Err(e) => {
                tracing::warn!("Retrying due to error: {e}, attempt {attempt}");
            }
        }
    }
    tracing::error!("Max retries reached for title: {}", title);
    None
}

pub struct ClusterSummarizer {
    fetcher: Arc<dyn FullTextFetcher>,
    summarizer: Arc<dyn GenerativeSummarizer>,
    max_attempts: usize,
}

impl ClusterSummarizer {
    pub fn new(fetcher: Arc<dyn FullTextFetcher>, summarizer: Arc<dyn GenerativeSummarizer>) -> Self {
        Self {
            fetcher,
            summarizer,
            max_attempts: SUMMARY_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn summarize(&self, items: &[SourceItem], cluster: &[usize]) -> SummaryOutcome {
        let fetched = join_all(cluster.iter().map(|&i| async move {
            let item = &items[i];
            match self.fetcher.fetch(&item.link).await {
                Ok(article) => Some((i, article)),
                Err(e) => {
                    tracing::error!("Failed to fetch article: {}, Error: {}", item.link, e);
                    None
                }
            }
        }))
        .await;
        let fetched: Vec<_> = fetched.into_iter().flatten().collect();

        if fetched.is_empty() {
            return SummaryOutcome::NoText;
        }

        let budget = if cluster.len() > 1 {
            MERGED_SENTENCES
        } else {
            SINGLE_SENTENCES
        };
        let combined = fetched
            .iter()
            .map(|(_, article)| clean_text(&article.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let digest_text = extractive_summary(&combined, budget);

        let title = fetched
            .iter()
            .map(|(i, _)| format!("{} {}", items[*i].title, items[*i].link))
            .collect::<Vec<_>>()
            .join("\n");

        if digest_text.trim().is_empty() {
            tracing::warn!("Empty summary generated for: {}", title);
            return SummaryOutcome::NoText;
        }

        let Some(synopsis) =
            generate_with_retry(self.summarizer.as_ref(), &title, &digest_text, self.max_attempts)
                .await
        else {
            return SummaryOutcome::Exhausted;
        };

        // Stored body first, then the page's og:image.
        let image = fetched.iter().find_map(|(i, article)| {
            first_image(items[*i].body_or_empty()).or_else(|| article.image.clone())
        });

        tracing::info!("Processed summary for: {}", title);
        SummaryOutcome::Summarized(ClusterSummary {
            members: fetched.into_iter().map(|(i, _)| i).collect(),
            synopsis,
            image,
        })
    }
}
