use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use super::timetable::JobTimetable;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::lease::InstanceLease;
use crate::models::ScheduleState;

/// The parts of [`ScheduleState`] whose change requires re-deriving jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub sync_interval_minutes: u32,
    pub never_synced: bool,
    pub digest_enabled: bool,
    pub digest_at: Option<DateTime<Utc>>,
    pub digest_duration_minutes: Option<u32>,
}

impl From<&ScheduleState> for ScheduleSnapshot {
    fn from(state: &ScheduleState) -> Self {
        Self {
            sync_interval_minutes: state.sync_interval_minutes,
            never_synced: state.last_sync.is_none(),
            digest_enabled: state.digest_enabled,
            digest_at: state.digest_at,
            digest_duration_minutes: state.digest_duration_minutes,
        }
    }
}

/// Which job classes need rescheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drift {
    pub sync: bool,
    pub digest: bool,
}

impl Drift {
    pub fn any(&self) -> bool {
        self.sync || self.digest
    }
}

/// Compare the current snapshot with the one seen on the previous tick.
/// With no previous snapshot everything counts as drifted.
pub fn detect_drift(previous: Option<&ScheduleSnapshot>, current: &ScheduleSnapshot) -> Drift {
    let Some(previous) = previous else {
        return Drift {
            sync: true,
            digest: true,
        };
    };

    Drift {
        sync: previous.sync_interval_minutes != current.sync_interval_minutes
            || previous.never_synced != current.never_synced,
        digest: previous.digest_enabled != current.digest_enabled
            || previous.digest_at != current.digest_at
            || previous.digest_duration_minutes != current.digest_duration_minutes,
    }
}

/// Polls the schedule state and keeps the timetable in step with it.
///
/// Owns the instance lease for the lifetime of the loop and releases it on
/// every exit path.
pub struct ReconciliationLoop {
    repo: Arc<Repository>,
    timetable: Arc<Mutex<JobTimetable>>,
    lease: Box<dyn InstanceLease>,
    poll_interval: Duration,
    wake: Arc<Notify>,
    last_seen: Option<ScheduleSnapshot>,
}

impl ReconciliationLoop {
    pub fn new(
        repo: Arc<Repository>,
        timetable: Arc<Mutex<JobTimetable>>,
        lease: Box<dyn InstanceLease>,
        poll_interval: Duration,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            repo,
            timetable,
            lease,
            poll_interval,
            wake,
            last_seen: None,
        }
    }

    /// One reconciliation pass. Holds the timetable lock from reading the
    /// state until all affected jobs are replaced.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Drift> {
        let mut timetable = self.timetable.lock().await;

        let state = self.repo.load_schedule_state().await?;
        let snapshot = ScheduleSnapshot::from(&state);
        let drift = detect_drift(self.last_seen.as_ref(), &snapshot);

        if drift.sync {
            timetable.schedule_sync(&state, now).await?;
        }
        timetable.ensure_cleanup(now).await?;
        if drift.digest {
            timetable.schedule_digest(&state, now).await?;
        }

        if drift.any() {
            debug!("reconciled schedule: {drift:?}");
        }
        self.last_seen = Some(snapshot);
        Ok(drift)
    }

    /// Run until `shutdown` resolves or a tick fails. Either way the executor
    /// is stopped and the lease released before returning.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.poll_interval);
        info!("Scheduler started");

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break Ok(());
                }
                _ = interval.tick() => {}
                _ = self.wake.notified() => {
                    debug!("reconciliation woken early");
                }
            }

            match AssertUnwindSafe(self.tick(Utc::now())).catch_unwind().await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!("An unexpected error occurred: {e}");
                    break Err(e);
                }
                Err(_) => {
                    error!("reconciliation tick panicked");
                    break Err(AppError::Scheduler("reconciliation tick panicked".to_string()));
                }
            }
        };

        if let Err(e) = self.timetable.lock().await.shutdown().await {
            warn!("failed to stop job executor: {e}");
        }
        if let Err(e) = self.lease.release() {
            warn!("failed to release scheduler lock: {e}");
        }
        info!("Scheduler shut down");
        outcome
    }
}

/// Resolves once `signal` does. If listening for the signal fails, the
/// error is logged and this never resolves.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("interrupt received"),
        Err(e) => {
            error!("unable to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}
