use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;

use super::extract::{clean_text, extractive_summary};
use crate::ai::SimilarityService;
use crate::models::SourceItem;
use crate::services::{html_to_text, FullTextFetcher};

/// Confirmation checks per candidate group before it dissolves.
pub const CONFIRM_ATTEMPTS: usize = 3;
/// Titles sent to the coarse comparison by default.
pub const DEFAULT_TITLE_CAP: usize = 1000;
const ENRICHMENT_SENTENCES: usize = 5;

/// Union-find over `0..n` with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSets {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Returns `false` if `a` and `b` were already in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Coalesce overlapping groups over `0..n` into disjoint sets, ordered by
/// smallest member. Indices outside `0..n` are ignored.
pub fn merge_groups(groups: &[Vec<usize>], n: usize) -> Vec<BTreeSet<usize>> {
    let mut sets = DisjointSets::new(n);
    let mut seen = BTreeSet::new();

    for group in groups {
        let members: Vec<usize> = group.iter().copied().filter(|&i| i < n).collect();
        if members.len() < group.len() {
            tracing::warn!("Ignoring out-of-range indices in group {:?}", group);
        }
        if let Some((&first, rest)) = members.split_first() {
            seen.insert(first);
            for &other in rest {
                seen.insert(other);
                sets.union(first, other);
            }
        }
    }

    let mut by_root: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for index in seen {
        let root = sets.find(index);
        by_root.entry(root).or_default().insert(index);
    }

    let mut merged: Vec<BTreeSet<usize>> = by_root.into_values().collect();
    merged.sort_by_key(|set| set.first().copied());
    merged
}

/// Groups candidates into clusters of the same story.
pub struct SimilarityClusterer {
    similarity: Arc<dyn SimilarityService>,
    fetcher: Arc<dyn FullTextFetcher>,
    title_cap: usize,
}

impl SimilarityClusterer {
    pub fn new(similarity: Arc<dyn SimilarityService>, fetcher: Arc<dyn FullTextFetcher>) -> Self {
        Self {
            similarity,
            fetcher,
            title_cap: DEFAULT_TITLE_CAP,
        }
    }

    /// Only the newest `cap` titles take part in the coarse comparison.
    /// Items past the cap are still summarized, each on its own.
    pub fn with_title_cap(mut self, cap: usize) -> Self {
        self.title_cap = cap.max(1);
        self
    }

    /// Partition `items` by index: confirmed multi-member groups first,
    /// then every remaining item on its own.
    pub async fn cluster(&self, items: &[SourceItem], compare_titles: bool) -> Vec<Vec<usize>> {
        let n = items.len();
        let coarse = if compare_titles {
            self.coarse_groups(items).await
        } else {
            tracing::info!("Skipping title comparison based on settings.");
            Vec::new()
        };

        let mut partition = Vec::new();
        let mut used = BTreeSet::new();

        // Indices outside the compared prefix are not valid answers.
        for candidate in merge_groups(&coarse, n.min(self.title_cap)) {
            if candidate.len() < 2 {
                continue;
            }
            let members: Vec<usize> = candidate.into_iter().collect();
            let confirmed = self.confirm(items, &members).await;

            for group in merge_groups(&confirmed, n) {
                if group.len() > 1 && group.iter().all(|i| !used.contains(i)) {
                    used.extend(group.iter().copied());
                    partition.push(group.into_iter().collect());
                }
            }
        }

        partition.extend((0..n).filter(|i| !used.contains(i)).map(|i| vec![i]));
        partition
    }

    async fn coarse_groups(&self, items: &[SourceItem]) -> Vec<Vec<usize>> {
        if items.len() > self.title_cap {
            tracing::info!(
                "Comparing the newest {} of {} titles; the rest are summarized individually",
                self.title_cap,
                items.len()
            );
        }
        let titles: BTreeMap<usize, String> = items
            .iter()
            .take(self.title_cap)
            .enumerate()
            .map(|(i, item)| (i, item.title.clone()))
            .collect();

        match self.similarity.compare(&titles).await {
            Ok(verdict) => {
                let groups = verdict.into_groups();
                if groups.is_empty() {
                    tracing::info!("No similar titles found.");
                }
                groups
            }
            Err(e) => {
                tracing::warn!("Title comparison failed, treating as no groups: {e}");
                Vec::new()
            }
        }
    }

    /// Re-check one candidate group with enriched texts. Returns groups of
    /// global indices; empty if the group dissolves.
    async fn confirm(&self, items: &[SourceItem], members: &[usize]) -> Vec<Vec<usize>> {
        tracing::info!("Checking similarity for cluster: {:?}", members);

        let enriched = join_all(members.iter().map(|&i| self.enrich(&items[i]))).await;
        let texts: BTreeMap<usize, String> = enriched.into_iter().enumerate().collect();

        for attempt in 1..=CONFIRM_ATTEMPTS {
            match self.similarity.compare(&texts).await {
                Ok(verdict) => {
                    let groups = verdict.into_groups();
                    tracing::info!("Received valid similarity response: {:?}", groups);
                    return groups
                        .into_iter()
                        .map(|group| {
                            group
                                .into_iter()
                                .filter_map(|local| members.get(local).copied())
                                .collect()
                        })
                        .collect();
                }
                Err(e) => {
                    tracing::warn!("Invalid similarity response, attempt {attempt}: {e}");
                }
            }
        }

        tracing::error!("Max retries reached with invalid response for {:?}", members);
        Vec::new()
    }

    /// Title plus a short extractive summary of the full text, or of the
    /// stored body when the page cannot be fetched.
    async fn enrich(&self, item: &SourceItem) -> String {
        let excerpt = match self.fetcher.fetch(&item.link).await {
            Ok(article) => extractive_summary(&clean_text(&article.text), ENRICHMENT_SENTENCES),
            Err(e) => {
                tracing::error!("Failed to fetch article: {}, Error: {}", item.link, e);
                html_to_text(item.body_or_empty()).unwrap_or_default()
            }
        };
        format!("{} {}", item.title, excerpt)
    }
}
