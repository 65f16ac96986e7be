//! Job scheduling: an id-keyed executor, the timetable rules for the three
//! job classes, and the reconciliation loop that keeps them in line with
//! the stored schedule state.

mod executor;
mod jobs;
mod reconcile;
mod timetable;

pub use executor::{JobExecutor, JobFn, JobInfo, Trigger};
pub use jobs::{JobRunner, SyncReport};
pub use reconcile::{detect_drift, shutdown_on, Drift, ReconciliationLoop, ScheduleSnapshot};
pub use timetable::{
    advance_digest_target, plan_digest, plan_sync, JobBook, JobTimetable, SyncPlan, CLEANUP_JOB,
    CLEANUP_IMMEDIATE_JOB, DIGEST_JOB, SYNC_IMMEDIATE_JOB, SYNC_JOB,
};
