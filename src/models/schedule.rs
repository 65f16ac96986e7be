use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Mutable per-installation configuration that drives the job timetable.
///
/// Re-read on every reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub sync_interval_minutes: u32,
    pub clean_after_days: u32,
    pub utc_offset_minutes: i32,
    pub last_sync: Option<DateTime<Utc>>,
    pub digest_enabled: bool,
    /// Next instant the digest should be ready by.
    pub digest_at: Option<DateTime<Utc>>,
    /// How long the previous digest run took.
    pub digest_duration_minutes: Option<u32>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            sync_interval_minutes: 60,
            clean_after_days: 60,
            utc_offset_minutes: 0,
            last_sync: None,
            digest_enabled: false,
            digest_at: None,
            digest_duration_minutes: None,
        }
    }
}

impl ScheduleState {
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// The digest target, defaulting to the next 07:00 local time.
    pub fn digest_target(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.digest_at.unwrap_or_else(|| {
            let seven = NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default();
            next_occurrence(seven, self.timezone(), now)
        })
    }
}

/// Settings consumed by the digest pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    pub lookback_hours: u32,
    pub include_read: bool,
    pub compare_titles: bool,
    pub translate: bool,
    pub language: String,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            include_read: false,
            compare_titles: true,
            translate: false,
            language: "English".to_string(),
        }
    }
}

/// First instant strictly after `now` whose local time-of-day in `tz` is `time`.
pub fn next_occurrence(time: NaiveTime, tz: FixedOffset, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let candidate = tz
        .from_local_datetime(&local_date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    if candidate <= now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}
