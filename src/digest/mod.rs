//! The digest pipeline: select recent unlinked items, cluster them by
//! story, summarize each cluster and persist the result. The issuance
//! tracker serves the output page by page.

mod cluster;
pub mod extract;
mod issuance;
mod persist;
mod pipeline;
mod selector;
mod summarize;

#[cfg(test)]
pub(crate) mod testing;

pub use cluster::{
    merge_groups, DisjointSets, SimilarityClusterer, CONFIRM_ATTEMPTS, DEFAULT_TITLE_CAP,
};
pub use issuance::{InMemoryIssuanceStore, IssuanceStore, IssuanceTracker};
pub use persist::{DigestPersister, PersistOutcome};
pub use pipeline::{DigestPipeline, DigestReport};
pub use selector::RecentItemSelector;
pub use summarize::{
    generate_with_retry, ClusterSummarizer, ClusterSummary, SummaryOutcome, SUMMARY_ATTEMPTS,
};
