use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;

/// A job body. Called once per firing.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

const MIN_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Fire once at the given instant (immediately if it has passed).
    Once { at: DateTime<Utc> },
    /// Fire every `period`, counted from when the job is added. `first` is
    /// the instant of the first firing.
    Every {
        first: DateTime<Utc>,
        period: Duration,
    },
}

impl Trigger {
    pub fn first_fire(&self) -> DateTime<Utc> {
        match self {
            Trigger::Once { at } => *at,
            Trigger::Every { first, .. } => *first,
        }
    }
}

/// Read-only view of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: String,
    pub trigger: Trigger,
}

struct ScheduledJob {
    uuid: Uuid,
    trigger: Trigger,
    fired: Arc<AtomicBool>,
}

impl ScheduledJob {
    fn is_pending(&self) -> bool {
        matches!(self.trigger, Trigger::Every { .. }) || !self.fired.load(Ordering::SeqCst)
    }
}

/// Named jobs on top of a [`JobScheduler`]. Adding a job with an existing
/// id replaces it.
///
/// Replacing or removing a job only unschedules it. A run that has already
/// started keeps going to completion.
pub struct JobExecutor {
    scheduler: JobScheduler,
    jobs: HashMap<String, ScheduledJob>,
}

impl JobExecutor {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        scheduler.start().await?;
        Ok(Self {
            scheduler,
            jobs: HashMap::new(),
        })
    }

    pub async fn add_job(&mut self, id: &str, trigger: Trigger, job: JobFn) -> Result<()> {
        if self.remove_job(id).await? {
            debug!("replacing job {id}");
        }

        let fired = Arc::new(AtomicBool::new(false));
        let scheduled = build_job(id, &trigger, job, Arc::clone(&fired))?;
        let uuid = self.scheduler.add(scheduled).await?;
        self.jobs.insert(
            id.to_string(),
            ScheduledJob {
                uuid,
                trigger,
                fired,
            },
        );
        Ok(())
    }

    /// The job if it is still pending. Fired one-shot jobs are gone.
    pub fn get_job(&self, id: &str) -> Option<JobInfo> {
        self.jobs
            .get(id)
            .filter(|job| job.is_pending())
            .map(|job| JobInfo {
                id: id.to_string(),
                trigger: job.trigger.clone(),
            })
    }

    /// Returns `false` if no job was registered under `id`.
    pub async fn remove_job(&mut self, id: &str) -> Result<bool> {
        let Some(job) = self.jobs.remove(id) else {
            return Ok(false);
        };
        if job.is_pending() {
            self.scheduler.remove(&job.uuid).await?;
        }
        Ok(true)
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.is_pending())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.jobs.clear();
        self.scheduler.shutdown().await?;
        info!("job executor shut down");
        Ok(())
    }
}

fn build_job(id: &str, trigger: &Trigger, job: JobFn, fired: Arc<AtomicBool>) -> Result<Job> {
    let id = id.to_string();
    let run = move |_uuid: Uuid, _scheduler: JobScheduler| {
        debug!("firing job {id}");
        fired.store(true, Ordering::SeqCst);
        job()
    };

    let scheduled = match trigger {
        Trigger::Once { at } => {
            let wait = (*at - Utc::now()).to_std().unwrap_or_default();
            Job::new_one_shot_at_instant_async(std::time::Instant::now() + wait, run)?
        }
        Trigger::Every { period, .. } => {
            let period = period.to_std().unwrap_or(MIN_PERIOD).max(MIN_PERIOD);
            Job::new_repeated_async(period, run)?
        }
    };
    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn counting_job(tx: mpsc::UnboundedSender<()>) -> JobFn {
        Arc::new(move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(());
            }
            .boxed()
        })
    }

    const WAIT: std::time::Duration = std::time::Duration::from_secs(10);

    #[tokio::test(flavor = "multi_thread")]
    async fn once_job_fires_and_disappears() {
        let mut executor = JobExecutor::new().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        executor
            .add_job("now", Trigger::Once { at: Utc::now() }, counting_job(tx))
            .await
            .unwrap();
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();

        assert!(executor.get_job("now").is_none());
        assert!(executor.job_ids().is_empty());
        executor.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_job_keeps_firing() {
        let mut executor = JobExecutor::new().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let period = Duration::seconds(1);

        executor
            .add_job(
                "tick",
                Trigger::Every {
                    first: Utc::now() + period,
                    period,
                },
                counting_job(tx),
            )
            .await
            .unwrap();

        for _ in 0..2 {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }
        assert!(executor.get_job("tick").is_some());
        executor.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replacing_a_job_unschedules_the_old_one() {
        let mut executor = JobExecutor::new().await.unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let old_fired = Arc::clone(&fired);
        let old: JobFn = Arc::new(move || {
            let fired = Arc::clone(&old_fired);
            async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });
        let soon = Utc::now() + Duration::seconds(1);
        executor
            .add_job("job", Trigger::Once { at: soon }, old)
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let replacement = Trigger::Once {
            at: Utc::now() + Duration::seconds(2),
        };
        executor
            .add_job("job", replacement.clone(), counting_job(tx))
            .await
            .unwrap();

        assert_eq!(executor.get_job("job").unwrap().trigger, replacement);
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        executor.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_and_shutdown() {
        let mut executor = JobExecutor::new().await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let far = Trigger::Once {
            at: Utc::now() + Duration::hours(1),
        };
        executor
            .add_job("a", far.clone(), counting_job(tx.clone()))
            .await
            .unwrap();
        executor.add_job("b", far, counting_job(tx)).await.unwrap();

        assert_eq!(executor.job_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(executor.remove_job("a").await.unwrap());
        assert!(!executor.remove_job("a").await.unwrap());
        executor.shutdown().await.unwrap();
        assert!(executor.job_ids().is_empty());
    }
}
