use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::executor::{JobExecutor, JobFn, JobInfo, Trigger};
use crate::error::Result;
use crate::models::ScheduleState;

pub const SYNC_JOB: &str = "sync";
pub const SYNC_IMMEDIATE_JOB: &str = "sync_immediate";
pub const CLEANUP_JOB: &str = "cleanup";
pub const CLEANUP_IMMEDIATE_JOB: &str = "cleanup_immediate";
pub const DIGEST_JOB: &str = "digest";

const CLEANUP_PERIOD_HOURS: i64 = 3;
const DEFAULT_DIGEST_DURATION_MINUTES: u32 = 30;
const DIGEST_SAFETY_MARGIN_MINUTES: i64 = 10;
const MISSED_DIGEST_DELAY_MINUTES: i64 = 3;

/// The bodies of the three job classes.
#[derive(Clone)]
pub struct JobBook {
    pub sync: JobFn,
    pub cleanup: JobFn,
    pub digest: JobFn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Set when the next regular run is already due.
    pub immediate: Option<DateTime<Utc>>,
    pub recurring: Trigger,
}

/// Next source-sync runs: `last_sync + interval`, or right now when that has
/// passed (including never having synced), plus the recurring cadence.
pub fn plan_sync(state: &ScheduleState, now: DateTime<Utc>) -> SyncPlan {
    let interval = Duration::minutes(i64::from(state.sync_interval_minutes.max(1)));
    let last_sync = state.last_sync.unwrap_or(DateTime::<Utc>::MIN_UTC);

    // Instants compare the same in every offset; the local zone only matters for display.
    let due = last_sync
        .checked_add_signed(interval)
        .map_or(true, |next| next <= now);

    SyncPlan {
        immediate: due.then_some(now),
        recurring: Trigger::Every {
            first: now + interval,
            period: interval,
        },
    }
}

/// When the digest job should start so it finishes by the target, or
/// `None` when digests are disabled.
pub fn plan_digest(state: &ScheduleState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !state.digest_enabled {
        return None;
    }

    let duration = state
        .digest_duration_minutes
        .unwrap_or(DEFAULT_DIGEST_DURATION_MINUTES);
    let start = state.digest_target(now)
        - Duration::minutes(i64::from(duration))
        - Duration::minutes(DIGEST_SAFETY_MARGIN_MINUTES);

    if start <= now {
        Some(now + Duration::minutes(MISSED_DIGEST_DELAY_MINUTES))
    } else {
        Some(start)
    }
}

/// The digest target after a run: one calendar day later. If the worker was
/// down for longer than that, keep stepping whole days until it is ahead of
/// `now` so missed days are not replayed back to back.
pub fn advance_digest_target(current: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = current + Duration::days(1);
    while next <= now {
        next += Duration::days(1);
    }
    next
}

/// Add/replace/query operations for the three job classes on top of a
/// [`JobExecutor`].
pub struct JobTimetable {
    executor: JobExecutor,
    book: JobBook,
}

impl JobTimetable {
    pub async fn new(book: JobBook) -> Result<Self> {
        Ok(Self {
            executor: JobExecutor::new().await?,
            book,
        })
    }

    pub async fn schedule_sync(
        &mut self,
        state: &ScheduleState,
        now: DateTime<Utc>,
    ) -> Result<SyncPlan> {
        let plan = plan_sync(state, now);

        if let Some(at) = plan.immediate {
            self.executor
                .add_job(
                    SYNC_IMMEDIATE_JOB,
                    Trigger::Once { at },
                    self.book.sync.clone(),
                )
                .await?;
            info!("Update feeds job scheduled to run immediately");
        }

        self.executor
            .add_job(SYNC_JOB, plan.recurring.clone(), self.book.sync.clone())
            .await?;
        info!(
            "Update feeds job scheduled to run at {} and every {} minutes",
            plan.recurring
                .first_fire()
                .with_timezone(&state.timezone()),
            state.sync_interval_minutes.max(1)
        );

        Ok(plan)
    }

    /// Establish the cleanup cadence once. Returns `true` if it was added.
    pub async fn ensure_cleanup(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.executor.get_job(CLEANUP_JOB).is_some() {
            return Ok(false);
        }

        self.executor
            .add_job(
                CLEANUP_IMMEDIATE_JOB,
                Trigger::Once { at: now },
                self.book.cleanup.clone(),
            )
            .await?;
        let period = Duration::hours(CLEANUP_PERIOD_HOURS);
        self.executor
            .add_job(
                CLEANUP_JOB,
                Trigger::Every {
                    first: now + period,
                    period,
                },
                self.book.cleanup.clone(),
            )
            .await?;
        info!("Clean feeds job scheduled to run immediately and then every {CLEANUP_PERIOD_HOURS} hours");
        Ok(true)
    }

    pub async fn schedule_digest(
        &mut self,
        state: &ScheduleState,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        match plan_digest(state, now) {
            Some(at) => {
                self.executor
                    .add_job(DIGEST_JOB, Trigger::Once { at }, self.book.digest.clone())
                    .await?;
                info!(
                    "Digest job scheduled to run at {}",
                    at.with_timezone(&state.timezone())
                );
                Ok(Some(at))
            }
            None => {
                if self.executor.remove_job(DIGEST_JOB).await? {
                    info!("Digest disabled, removed pending digest job");
                } else {
                    debug!("Digest disabled, nothing to schedule");
                }
                Ok(None)
            }
        }
    }

    pub fn job(&self, id: &str) -> Option<JobInfo> {
        self.executor.get_job(id)
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.executor.job_ids()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.executor.shutdown().await
    }
}
