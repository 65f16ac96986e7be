use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    DigestEntry, DigestSettings, LinkedItem, NewSource, NewSourceItem, ScheduleState, Source,
    SourceItem,
};

use super::schema::SCHEMA;

/// Outcome of writing a digest entry: the stored row and whether it is new.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub entry: DigestEntry,
    pub created: bool,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    // Source operations

    pub async fn insert_source(&self, source: NewSource) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sources (title, url, digest_enabled) VALUES (?1, ?2, ?3)",
                    params![source.title, source.url, source.digest_enabled],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_all_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, url, digest_enabled, last_fetched FROM sources ORDER BY title",
                )?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn update_source_last_fetched(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET last_fetched = ?1 WHERE id = ?2",
                    params![fmt_ts(at), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Source item operations

    /// Insert an item unless its link is already known. Returns the new id.
    pub async fn insert_item(&self, item: NewSourceItem) -> Result<Option<i64>> {
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT OR IGNORE INTO source_items (source_id, title, link, body, published_at)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![
                        item.source_id,
                        item.title,
                        item.link,
                        item.body,
                        item.published_at.map(fmt_ts),
                    ],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;
        Ok(id)
    }

    /// Items from digest-enabled sources, published at or after `since`,
    /// that no digest entry links to yet. Newest first.
    pub async fn recent_unlinked_items(
        &self,
        since: DateTime<Utc>,
        include_read: bool,
    ) -> Result<Vec<SourceItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT i.id, i.source_id, i.title, i.link, i.body, i.published_at,
                              i.is_read, i.is_favorite
                       FROM source_items i
                       JOIN sources s ON i.source_id = s.id
                       LEFT JOIN source_links l ON l.item_id = i.id
                       WHERE s.digest_enabled = 1
                         AND l.id IS NULL
                         AND i.published_at IS NOT NULL
                         AND i.published_at >= ?1
                         AND (?2 = 1 OR i.is_read = 0)
                       ORDER BY i.published_at DESC, i.id DESC"#,
                )?;
                let items = stmt
                    .query_map(params![fmt_ts(since), include_read], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn mark_item_read(&self, id: i64, is_read: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE source_items SET is_read = ?1 WHERE id = ?2",
                    params![is_read, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_item_favorite(&self, id: i64, is_favorite: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE source_items SET is_favorite = ?1 WHERE id = ?2",
                    params![is_favorite, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Delete non-favourite items published before `cutoff`. Links cascade.
    pub async fn delete_items_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let deleted = tx.execute(
                    r#"DELETE FROM source_items
                       WHERE is_favorite = 0
                         AND published_at IS NOT NULL
                         AND published_at < ?1"#,
                    params![fmt_ts(cutoff)],
                )?;
                tx.commit()?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    // Digest entry operations

    pub async fn find_digest_by_link(&self, link: &str) -> Result<Option<DigestEntry>> {
        let link = link.to_string();
        let entry = self
            .conn
            .call(move |conn| {
                let entry = conn
                    .query_row(
                        r#"SELECT id, synopsis, link, image, published_at, created_at, is_read
                           FROM digest_entries WHERE link = ?1"#,
                        params![link],
                        entry_from_row,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    /// Reuse the entry sharing `link` (refreshing only its image) or create it.
    ///
    /// Commits on its own so links can be written afterwards without the
    /// entry ever being lost to a later failure.
    pub async fn upsert_digest_entry(
        &self,
        synopsis: String,
        link: String,
        image: Option<String>,
        published_at: DateTime<Utc>,
    ) -> Result<StoredEntry> {
        let stored = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing = tx
                    .query_row(
                        r#"SELECT id, synopsis, link, image, published_at, created_at, is_read
                           FROM digest_entries WHERE link = ?1"#,
                        params![link],
                        entry_from_row,
                    )
                    .optional()?;

                let stored = match existing {
                    Some(mut entry) => {
                        tx.execute(
                            "UPDATE digest_entries SET image = ?1 WHERE id = ?2",
                            params![image, entry.id],
                        )?;
                        entry.image = image;
                        StoredEntry {
                            entry,
                            created: false,
                        }
                    }
                    None => {
                        let created_at = Utc::now();
                        tx.execute(
                            r#"INSERT INTO digest_entries (synopsis, link, image, published_at, created_at)
                               VALUES (?1, ?2, ?3, ?4, ?5)"#,
                            params![
                                synopsis,
                                link,
                                image,
                                fmt_ts(published_at),
                                fmt_ts(created_at)
                            ],
                        )?;
                        StoredEntry {
                            entry: DigestEntry {
                                id: tx.last_insert_rowid(),
                                synopsis,
                                link,
                                image,
                                published_at,
                                created_at,
                                is_read: false,
                            },
                            created: true,
                        }
                    }
                };
                tx.commit()?;
                Ok(stored)
            })
            .await?;
        Ok(stored)
    }

    /// Link items to an entry, skipping pairs that already exist.
    /// Returns the number of new links.
    pub async fn link_items(&self, entry_id: i64, item_ids: Vec<i64>) -> Result<usize> {
        let linked = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut linked = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO source_links (item_id, entry_id) VALUES (?1, ?2)",
                    )?;
                    for item_id in item_ids {
                        linked += stmt.execute(params![item_id, entry_id])?;
                    }
                }
                tx.commit()?;
                Ok(linked)
            })
            .await?;
        Ok(linked)
    }

    /// One raw page of digest entries strictly older than `cursor`
    /// (by publish instant, then id). Only entries with at least one link.
    pub async fn digest_entries_before(
        &self,
        cursor: Option<i64>,
        limit: usize,
        unread_only: bool,
    ) -> Result<Vec<DigestEntry>> {
        let limit = limit as i64;
        let entries = self
            .conn
            .call(move |conn| {
                let anchor: Option<(String, i64)> = match cursor {
                    Some(id) => conn
                        .query_row(
                            "SELECT published_at, id FROM digest_entries WHERE id = ?1",
                            params![id],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .optional()?,
                    None => None,
                };
                let (anchor_at, anchor_id) = match anchor {
                    Some((at, id)) => (Some(at), Some(id)),
                    None => (None, None),
                };

                let mut stmt = conn.prepare(
                    r#"SELECT d.id, d.synopsis, d.link, d.image, d.published_at, d.created_at, d.is_read
                       FROM digest_entries d
                       WHERE EXISTS (SELECT 1 FROM source_links l WHERE l.entry_id = d.id)
                         AND (?1 IS NULL
                              OR d.published_at < ?1
                              OR (d.published_at = ?1 AND d.id < ?2))
                         AND (?3 = 0 OR d.is_read = 0)
                       ORDER BY d.published_at DESC, d.id DESC
                       LIMIT ?4"#,
                )?;
                let entries = stmt
                    .query_map(params![anchor_at, anchor_id, unread_only, limit], entry_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    pub async fn linked_items(&self, entry_id: i64) -> Result<Vec<LinkedItem>> {
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT i.id, i.title, i.link, s.id, s.title
                       FROM source_links l
                       JOIN source_items i ON l.item_id = i.id
                       JOIN sources s ON i.source_id = s.id
                       WHERE l.entry_id = ?1
                       ORDER BY l.id"#,
                )?;
                let items = stmt
                    .query_map(params![entry_id], |row| {
                        Ok(LinkedItem {
                            item_id: row.get(0)?,
                            title: row.get(1)?,
                            link: row.get(2)?,
                            source_id: row.get(3)?,
                            source_title: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn mark_digest_read(&self, id: i64, is_read: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE digest_entries SET is_read = ?1 WHERE id = ?2",
                    params![is_read, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn count_digest_entries(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM digest_entries").await
    }

    pub async fn count_source_links(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM source_links").await
    }

    async fn count(&self, sql: &'static str) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .await?;
        Ok(count)
    }

    // Settings

    pub async fn load_schedule_state(&self) -> Result<ScheduleState> {
        let state = self
            .conn
            .call(|conn| {
                let state = conn.query_row(
                    r#"SELECT sync_interval_minutes, clean_after_days, utc_offset_minutes, last_sync,
                              digest_enabled, digest_at, digest_duration_minutes
                       FROM settings WHERE id = 1"#,
                    [],
                    |row| {
                        Ok(ScheduleState {
                            sync_interval_minutes: row.get(0)?,
                            clean_after_days: row.get(1)?,
                            utc_offset_minutes: row.get(2)?,
                            last_sync: row
                                .get::<_, Option<String>>(3)?
                                .and_then(|s| parse_datetime(&s)),
                            digest_enabled: row.get(4)?,
                            digest_at: row
                                .get::<_, Option<String>>(5)?
                                .and_then(|s| parse_datetime(&s)),
                            digest_duration_minutes: row.get(6)?,
                        })
                    },
                )?;
                Ok(state)
            })
            .await?;
        Ok(state)
    }

    pub async fn load_digest_settings(&self) -> Result<DigestSettings> {
        let settings = self
            .conn
            .call(|conn| {
                let settings = conn.query_row(
                    r#"SELECT lookback_hours, include_read, compare_titles, translate, language
                       FROM settings WHERE id = 1"#,
                    [],
                    |row| {
                        Ok(DigestSettings {
                            lookback_hours: row.get(0)?,
                            include_read: row.get(1)?,
                            compare_titles: row.get(2)?,
                            translate: row.get(3)?,
                            language: row.get(4)?,
                        })
                    },
                )?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.update_settings("UPDATE settings SET last_sync = ?1 WHERE id = 1", fmt_ts(at))
            .await
    }

    /// Duration feedback written after every digest run.
    pub async fn record_digest_run(
        &self,
        duration_minutes: u32,
        next_digest_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE settings SET digest_duration_minutes = ?1, digest_at = ?2 WHERE id = 1",
                    params![duration_minutes, fmt_ts(next_digest_at)],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_sync_interval(&self, minutes: u32) -> Result<()> {
        self.update_settings(
            "UPDATE settings SET sync_interval_minutes = ?1 WHERE id = 1",
            minutes,
        )
        .await
    }

    pub async fn set_clean_after_days(&self, days: u32) -> Result<()> {
        self.update_settings("UPDATE settings SET clean_after_days = ?1 WHERE id = 1", days)
            .await
    }

    pub async fn set_utc_offset(&self, minutes: i32) -> Result<()> {
        self.update_settings(
            "UPDATE settings SET utc_offset_minutes = ?1 WHERE id = 1",
            minutes,
        )
        .await
    }

    pub async fn set_digest_enabled(&self, enabled: bool) -> Result<()> {
        self.update_settings("UPDATE settings SET digest_enabled = ?1 WHERE id = 1", enabled)
            .await
    }

    pub async fn set_digest_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.update_settings("UPDATE settings SET digest_at = ?1 WHERE id = 1", fmt_ts(at))
            .await
    }

    pub async fn update_digest_settings(&self, settings: DigestSettings) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE settings SET lookback_hours = ?1, include_read = ?2,
                           compare_titles = ?3, translate = ?4, language = ?5
                       WHERE id = 1"#,
                    params![
                        settings.lookback_hours,
                        settings.include_read,
                        settings.compare_titles,
                        settings.translate,
                        settings.language,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn update_settings<T>(&self, sql: &'static str, value: T) -> Result<()>
    where
        T: rusqlite::ToSql + Send + 'static,
    {
        self.conn
            .call(move |conn| {
                conn.execute(sql, params![value])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Run raw SQL against the store, e.g. to break it on purpose.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fixed-width UTC timestamps so that text comparison orders correctly.
pub fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        digest_enabled: row.get(3)?,
        last_fetched: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_datetime(&s)),
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<SourceItem> {
    Ok(SourceItem {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        link: row.get(3)?,
        body: row.get(4)?,
        published_at: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s)),
        is_read: row.get(6)?,
        is_favorite: row.get(7)?,
    })
}

fn entry_from_row(row: &Row) -> rusqlite::Result<DigestEntry> {
    Ok(DigestEntry {
        id: row.get(0)?,
        synopsis: row.get(1)?,
        link: row.get(2)?,
        image: row.get(3)?,
        published_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        is_read: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repo_with_source(digest_enabled: bool) -> (Repository, i64) {
        let repo = Repository::in_memory().await.unwrap();
        let source_id = repo
            .insert_source(NewSource {
                title: "Example".to_string(),
                url: format!("https://example.com/{digest_enabled}.xml"),
                digest_enabled,
            })
            .await
            .unwrap();
        (repo, source_id)
    }

    fn new_item(source_id: i64, n: u32, published_at: DateTime<Utc>) -> NewSourceItem {
        NewSourceItem {
            source_id,
            title: format!("Item {n}"),
            link: format!("https://example.com/items/{n}"),
            body: Some(format!("Body of item {n}")),
            published_at: Some(published_at),
        }
    }

    #[tokio::test]
    async fn duplicate_links_are_ignored() {
        let (repo, source_id) = repo_with_source(true).await;
        let now = Utc::now();

        let first = repo.insert_item(new_item(source_id, 1, now)).await.unwrap();
        let second = repo.insert_item(new_item(source_id, 1, now)).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn recent_unlinked_items_filters_window_links_and_read() {
        let (repo, source_id) = repo_with_source(true).await;
        let now = Utc::now();

        let fresh = repo
            .insert_item(new_item(source_id, 1, now - Duration::hours(1)))
            .await
            .unwrap()
            .unwrap();
        let newer = repo
            .insert_item(new_item(source_id, 2, now - Duration::minutes(5)))
            .await
            .unwrap()
            .unwrap();
        repo.insert_item(new_item(source_id, 3, now - Duration::hours(48)))
            .await
            .unwrap();
        let read = repo
            .insert_item(new_item(source_id, 4, now - Duration::hours(2)))
            .await
            .unwrap()
            .unwrap();
        repo.mark_item_read(read, true).await.unwrap();
        let linked = repo
            .insert_item(new_item(source_id, 5, now - Duration::hours(3)))
            .await
            .unwrap()
            .unwrap();
        let stored = repo
            .upsert_digest_entry("s".into(), "https://example.com/items/5".into(), None, now)
            .await
            .unwrap();
        repo.link_items(stored.entry.id, vec![linked]).await.unwrap();

        let since = now - Duration::hours(24);
        let ids: Vec<i64> = repo
            .recent_unlinked_items(since, false)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![newer, fresh]);

        let with_read: Vec<i64> = repo
            .recent_unlinked_items(since, true)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(with_read, vec![newer, fresh, read]);
    }

    #[tokio::test]
    async fn items_from_disabled_sources_are_not_candidates() {
        let (repo, source_id) = repo_with_source(false).await;
        let now = Utc::now();
        repo.insert_item(new_item(source_id, 1, now)).await.unwrap();

        let items = repo
            .recent_unlinked_items(now - Duration::hours(24), true)
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn upsert_reuses_entry_and_refreshes_image() {
        let repo = Repository::in_memory().await.unwrap();
        let now = Utc::now();

        let first = repo
            .upsert_digest_entry("one".into(), "https://a".into(), None, now)
            .await
            .unwrap();
        let second = repo
            .upsert_digest_entry(
                "two".into(),
                "https://a".into(),
                Some("https://img".into()),
                now,
            )
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(second.entry.synopsis, "one");
        assert_eq!(second.entry.image.as_deref(), Some("https://img"));
        assert_eq!(repo.count_digest_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn link_items_is_idempotent() {
        let (repo, source_id) = repo_with_source(true).await;
        let now = Utc::now();
        let item = repo
            .insert_item(new_item(source_id, 1, now))
            .await
            .unwrap()
            .unwrap();
        let stored = repo
            .upsert_digest_entry("s".into(), "https://example.com/items/1".into(), None, now)
            .await
            .unwrap();

        assert_eq!(repo.link_items(stored.entry.id, vec![item]).await.unwrap(), 1);
        assert_eq!(repo.link_items(stored.entry.id, vec![item]).await.unwrap(), 0);
        assert_eq!(repo.count_source_links().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cleanup_keeps_favorites_and_cascades_links() {
        let (repo, source_id) = repo_with_source(true).await;
        let now = Utc::now();
        let old = repo
            .insert_item(new_item(source_id, 1, now - Duration::days(90)))
            .await
            .unwrap()
            .unwrap();
        let favorite = repo
            .insert_item(new_item(source_id, 2, now - Duration::days(90)))
            .await
            .unwrap()
            .unwrap();
        repo.set_item_favorite(favorite, true).await.unwrap();
        let stored = repo
            .upsert_digest_entry("s".into(), "https://example.com/items/1".into(), None, now)
            .await
            .unwrap();
        repo.link_items(stored.entry.id, vec![old]).await.unwrap();

        let deleted = repo
            .delete_items_before(now - Duration::days(60))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(repo.count_source_links().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn schedule_state_round_trips_through_settings() {
        let repo = Repository::in_memory().await.unwrap();
        let state = repo.load_schedule_state().await.unwrap();
        assert_eq!(state, ScheduleState::default());

        let at = DateTime::parse_from_rfc3339("2026-05-01T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        repo.set_sync_interval(15).await.unwrap();
        repo.set_digest_enabled(true).await.unwrap();
        repo.record_digest_run(12, at).await.unwrap();
        repo.set_last_sync(at).await.unwrap();

        let state = repo.load_schedule_state().await.unwrap();
        assert_eq!(state.sync_interval_minutes, 15);
        assert!(state.digest_enabled);
        assert_eq!(state.digest_duration_minutes, Some(12));
        assert_eq!(state.digest_at, Some(at));
        assert_eq!(state.last_sync, Some(at));
    }

    #[tokio::test]
    async fn digest_settings_update() {
        let repo = Repository::in_memory().await.unwrap();
        assert_eq!(
            repo.load_digest_settings().await.unwrap(),
            DigestSettings::default()
        );

        let settings = DigestSettings {
            lookback_hours: 6,
            include_read: true,
            compare_titles: false,
            translate: true,
            language: "German".to_string(),
        };
        repo.update_digest_settings(settings.clone()).await.unwrap();

        assert_eq!(repo.load_digest_settings().await.unwrap(), settings);
    }
}
