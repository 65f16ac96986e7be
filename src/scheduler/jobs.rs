use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use super::executor::JobFn;
use super::timetable::{advance_digest_target, JobBook};
use crate::db::Repository;
use crate::digest::{DigestPipeline, DigestReport};
use crate::error::Result;
use crate::feed::FeedFetcher;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sources: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub too_old: usize,
    /// Items that could not be stored.
    pub failed: usize,
}

/// Bodies of the sync, cleanup and digest jobs.
///
/// A job that fires while its previous run is still going is skipped.
pub struct JobRunner {
    repo: Arc<Repository>,
    feeds: FeedFetcher,
    pipeline: DigestPipeline,
    wake: Option<Arc<Notify>>,
    sync_running: Mutex<()>,
    cleanup_running: Mutex<()>,
    digest_running: Mutex<()>,
}

impl JobRunner {
    pub fn new(repo: Arc<Repository>, feeds: FeedFetcher, pipeline: DigestPipeline) -> Self {
        Self {
            repo,
            feeds,
            pipeline,
            wake: None,
            sync_running: Mutex::new(()),
            cleanup_running: Mutex::new(()),
            digest_running: Mutex::new(()),
        }
    }

    /// Notified after each digest run so the next target is picked up
    /// without waiting for the poll.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Fetch every source and store new items inside the retention window.
    pub async fn run_sync(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let state = self.repo.load_schedule_state().await?;
        let cutoff = now - Duration::days(i64::from(state.clean_after_days));
        let sources = self.repo.get_all_sources().await?;

        let mut report = SyncReport {
            sources: sources.len(),
            ..SyncReport::default()
        };

        for (source_id, items) in self.feeds.refresh_all(sources).await {
            report.fetched += items.len();
            for mut item in items {
                let published = *item.published_at.get_or_insert(now);
                if published < cutoff {
                    report.too_old += 1;
                    continue;
                }
                let link = item.link.clone();
                match self.repo.insert_item(item).await {
                    Ok(Some(_)) => report.inserted += 1,
                    Ok(None) => {}
                    Err(e) => {
                        error!("Failed to store item {link}: {e}");
                        report.failed += 1;
                    }
                }
            }
            if let Err(e) = self.repo.update_source_last_fetched(source_id, now).await {
                error!("Failed to update source {source_id}: {e}");
            }
        }

        self.repo.set_last_sync(now).await?;
        info!(
            "Synced {} sources: {} new of {} fetched",
            report.sources, report.inserted, report.fetched
        );
        Ok(report)
    }

    /// Delete non-favourite items older than the retention window.
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let state = self.repo.load_schedule_state().await?;
        let cutoff = now - Duration::days(i64::from(state.clean_after_days));
        let deleted = self.repo.delete_items_before(cutoff).await?;
        info!("Cleaned {deleted} items published before {cutoff}");
        Ok(deleted)
    }

    /// Run the pipeline, then record how long it took and move the target
    /// one day on. The target moves even when the run fails.
    pub async fn run_digest(&self, now: DateTime<Utc>) -> Result<DigestReport> {
        let state = self.repo.load_schedule_state().await?;
        let target = state.digest_target(now);
        let started = Instant::now();

        let outcome = self.pipeline.run(now).await;

        let minutes = started.elapsed().as_secs().div_ceil(60).max(1);
        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);
        let next = advance_digest_target(target, Utc::now());
        self.repo.record_digest_run(minutes, next).await?;
        info!(
            "Digest run took {minutes} min; next digest due {}",
            next.with_timezone(&state.timezone())
        );

        if let Some(wake) = &self.wake {
            wake.notify_one();
        }
        outcome
    }

    async fn sync_job(&self) {
        let Ok(_guard) = self.sync_running.try_lock() else {
            warn!("Sync still running, skipping this firing");
            return;
        };
        if let Err(e) = self.run_sync(Utc::now()).await {
            error!("Error updating feeds: {e}");
        }
    }

    async fn cleanup_job(&self) {
        let Ok(_guard) = self.cleanup_running.try_lock() else {
            warn!("Cleanup still running, skipping this firing");
            return;
        };
        if let Err(e) = self.run_cleanup(Utc::now()).await {
            error!("Error cleaning feeds: {e}");
        }
    }

    async fn digest_job(&self) {
        let Ok(_guard) = self.digest_running.try_lock() else {
            warn!("Digest still running, skipping this firing");
            return;
        };
        info!("Digest job started");
        match self.run_digest(Utc::now()).await {
            Ok(report) => info!("Digest job finished: {report:?}"),
            Err(e) => error!("Error building digest: {e}"),
        }
    }

    /// Job bodies for the timetable.
    pub fn job_book(self: &Arc<Self>) -> JobBook {
        let runner = Arc::clone(self);
        let sync: JobFn = Arc::new(move || {
            let runner = Arc::clone(&runner);
            async move { runner.sync_job().await }.boxed()
        });

        let runner = Arc::clone(self);
        let cleanup: JobFn = Arc::new(move || {
            let runner = Arc::clone(&runner);
            async move { runner.cleanup_job().await }.boxed()
        });

        let runner = Arc::clone(self);
        let digest: JobFn = Arc::new(move || {
            let runner = Arc::clone(&runner);
            async move { runner.digest_job().await }.boxed()
        });

        JobBook {
            sync,
            cleanup,
            digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::testing::{StubFetcher, StubSimilarity, StubSummarizer};
    use crate::digest::{ClusterSummarizer, DigestPersister, SimilarityClusterer};
    use crate::models::{NewSource, NewSourceItem};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner(repo: &Arc<Repository>) -> JobRunner {
        let fetcher = Arc::new(StubFetcher::working());
        let pipeline = DigestPipeline::new(
            Arc::clone(repo),
            SimilarityClusterer::new(Arc::new(StubSimilarity::new(vec![])), fetcher.clone()),
            ClusterSummarizer::new(fetcher, Arc::new(StubSummarizer::echo())),
            DigestPersister::new(Arc::clone(repo), None),
        );
        let feeds = FeedFetcher::new(std::time::Duration::from_secs(5)).unwrap();
        JobRunner::new(Arc::clone(repo), feeds, pipeline)
    }

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(link, date)| {
                format!(
                    "<item><title>{link}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Feed</title><link>https://x</link><description>d</description>{body}</channel></rss>"#
        )
    }

    #[tokio::test]
    async fn sync_inserts_fresh_items_and_records_last_sync() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let fresh = (now - Duration::hours(1)).to_rfc2822();
        let stale = (now - Duration::days(90)).to_rfc2822();
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
                ("https://news.example.com/a", fresh.as_str()),
                ("https://news.example.com/b", stale.as_str()),
            ])))
            .mount(&server)
            .await;

        let repo = Arc::new(Repository::in_memory().await.unwrap());
        repo.insert_source(NewSource {
            title: "Feed".into(),
            url: format!("{}/rss", server.uri()),
            digest_enabled: true,
        })
        .await
        .unwrap();
        let runner = runner(&repo);

        let report = runner.run_sync(now).await.unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.too_old, 1);

        let again = runner.run_sync(now).await.unwrap();
        assert_eq!(again.inserted, 0);

        let state = repo.load_schedule_state().await.unwrap();
        assert_eq!(state.last_sync.map(|t| t.timestamp()), Some(now.timestamp()));
        let sources = repo.get_all_sources().await.unwrap();
        assert!(sources[0].last_fetched.is_some());
    }

    #[tokio::test]
    async fn failed_item_does_not_stop_the_sync() {
        let server = MockServer::start().await;
        let now = Utc::now();
        let fresh = (now - Duration::hours(1)).to_rfc2822();
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
                ("https://news.example.com/rejected", fresh.as_str()),
                ("https://news.example.com/kept", fresh.as_str()),
            ])))
            .mount(&server)
            .await;

        let repo = Arc::new(Repository::in_memory().await.unwrap());
        repo.insert_source(NewSource {
            title: "Feed".into(),
            url: format!("{}/rss", server.uri()),
            digest_enabled: true,
        })
        .await
        .unwrap();
        repo.execute_batch(
            "CREATE TRIGGER reject_item BEFORE INSERT ON source_items \
             WHEN NEW.link LIKE '%/rejected' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .await
        .unwrap();

        let report = runner(&repo).run_sync(now).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 1);
        assert!(repo.load_schedule_state().await.unwrap().last_sync.is_some());
    }

    #[tokio::test]
    async fn cleanup_uses_retention_window() {
        let repo = Arc::new(Repository::in_memory().await.unwrap());
        let source_id = repo
            .insert_source(NewSource {
                title: "Feed".into(),
                url: "https://feed.example.com/rss".into(),
                digest_enabled: true,
            })
            .await
            .unwrap();
        let now = Utc::now();
        for (n, days) in [(1, 5), (2, 20)] {
            repo.insert_item(NewSourceItem {
                source_id,
                title: format!("t{n}"),
                link: format!("https://feed.example.com/{n}"),
                body: None,
                published_at: Some(now - Duration::days(days)),
            })
            .await
            .unwrap();
        }
        repo.set_clean_after_days(10).await.unwrap();

        assert_eq!(runner(&repo).run_cleanup(now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn digest_run_records_duration_and_advances_target() {
        let repo = Arc::new(Repository::in_memory().await.unwrap());
        let now = Utc::now();
        let target = now + Duration::minutes(20);
        repo.set_digest_enabled(true).await.unwrap();
        repo.set_digest_at(target).await.unwrap();
        let wake = Arc::new(Notify::new());
        let runner = runner(&repo).with_wake(Arc::clone(&wake));

        let report = runner.run_digest(now).await.unwrap();
        assert_eq!(report, DigestReport::default());

        let state = repo.load_schedule_state().await.unwrap();
        assert_eq!(state.digest_duration_minutes, Some(1));
        assert_eq!(
            state.digest_at.map(|t| t.timestamp()),
            Some((target + Duration::days(1)).timestamp())
        );
        // The stored permit wakes the next waiter immediately.
        tokio::time::timeout(std::time::Duration::from_secs(1), wake.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn job_book_bodies_swallow_errors() {
        let repo = Arc::new(Repository::in_memory().await.unwrap());
        let runner = Arc::new(runner(&repo));
        let book = runner.job_book();

        (book.sync)().await;
        (book.cleanup)().await;
        (book.digest)().await;

        assert!(repo.load_schedule_state().await.unwrap().last_sync.is_some());
    }
}
