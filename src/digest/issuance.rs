use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::DigestView;

/// Per-session record of digest entries already delivered.
///
/// The in-memory store ties a session to one process; a shared keyed store
/// can implement this trait for multi-instance deployments.
#[async_trait]
pub trait IssuanceStore: Send + Sync {
    async fn issued(&self, session: &str) -> Result<HashSet<i64>>;
    async fn replace(&self, session: &str, issued: HashSet<i64>) -> Result<()>;
    async fn reset(&self, session: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryIssuanceStore {
    sessions: Mutex<HashMap<String, HashSet<i64>>>,
}

impl InMemoryIssuanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, HashSet<i64>>>> {
        self.sessions
            .lock()
            .map_err(|_| AppError::Other(anyhow::anyhow!("issuance store lock poisoned")))
    }
}

#[async_trait]
impl IssuanceStore for InMemoryIssuanceStore {
    async fn issued(&self, session: &str) -> Result<HashSet<i64>> {
        Ok(self.sessions()?.get(session).cloned().unwrap_or_default())
    }

    async fn replace(&self, session: &str, issued: HashSet<i64>) -> Result<()> {
        self.sessions()?.insert(session.to_string(), issued);
        Ok(())
    }

    async fn reset(&self, session: &str) -> Result<()> {
        self.sessions()?.remove(session);
        Ok(())
    }
}

/// Pages through digest entries without handing the same entry to a
/// session twice in one walk.
pub struct IssuanceTracker {
    repo: Arc<Repository>,
    store: Arc<dyn IssuanceStore>,
}

impl IssuanceTracker {
    pub fn new(repo: Arc<Repository>, store: Arc<dyn IssuanceStore>) -> Self {
        Self { repo, store }
    }

    /// Up to `limit` entries older than `cursor` (newest first) that this
    /// session has not seen. No cursor starts a fresh walk.
    ///
    /// Reads `2 * limit` raw rows; fewer than that counts as the end of the
    /// stream and clears the session so the next walk starts over. Near the
    /// boundary this can hand out an entry a second time.
    pub async fn next_page(
        &self,
        session: &str,
        cursor: Option<i64>,
        limit: usize,
        unread_only: bool,
    ) -> Result<Vec<DigestView>> {
        let limit = limit.max(1);
        if cursor.is_none() {
            self.store.reset(session).await?;
        }
        let mut issued = self.store.issued(session).await?;

        let raw = self
            .repo
            .digest_entries_before(cursor, limit * 2, unread_only)
            .await?;
        let exhausted = raw.len() < limit * 2;

        let mut page = Vec::with_capacity(limit);
        for entry in raw {
            if page.len() >= limit {
                break;
            }
            if !issued.insert(entry.id) {
                continue;
            }
            let items = self.repo.linked_items(entry.id).await?;
            page.push(DigestView { entry, items });
        }

        if exhausted {
            self.store.reset(session).await?;
        } else {
            self.store.replace(session, issued).await?;
        }
        Ok(page)
    }
}
