use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted synopsis of one resolved cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntry {
    pub id: i64,
    pub synopsis: String,
    /// Link of the first member of the cluster. Globally unique.
    pub link: String,
    pub image: Option<String>,
    /// Publication instant of the representative item, used for page ordering.
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// A source item as shown under a digest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedItem {
    pub item_id: i64,
    pub title: String,
    pub link: String,
    pub source_id: i64,
    pub source_title: String,
}

/// Read-side rendering of one digest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestView {
    pub entry: DigestEntry,
    pub items: Vec<LinkedItem>,
}
