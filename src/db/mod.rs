mod repository;
mod schema;

pub use repository::{fmt_ts, Repository, StoredEntry};
