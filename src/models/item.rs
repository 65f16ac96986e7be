use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered content source (an RSS/Atom feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub digest_enabled: bool,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSource {
    pub title: String,
    pub url: String,
    pub digest_enabled: bool,
}

/// One ingested article. `link` is globally unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub is_favorite: bool,
}

impl SourceItem {
    pub fn body_or_empty(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct NewSourceItem {
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
