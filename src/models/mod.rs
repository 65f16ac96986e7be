mod digest;
mod item;
mod schedule;

pub use digest::{DigestEntry, DigestView, LinkedItem};
pub use item::{NewSource, NewSourceItem, Source, SourceItem};
pub use schedule::{next_occurrence, DigestSettings, ScheduleState};
