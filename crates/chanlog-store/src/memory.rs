//! In-memory log store.

#![allow(clippy::disallowed_types, reason = "Lock is never held across an await")]

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{Cursor, Entry, EntryId, Fields, LogStore, StoreError};

/// In-memory log service for testing and offline use.
///
/// Keeps every key's entries in a `Vec` ordered by id and assigns ids the way
/// the log service does: wall-clock millis, bumped by a sequence number when
/// the clock has not advanced past the key's last id. Clones share state, so a
/// test can hand one clone to the bus and keep another for inspection.
///
/// Blocking reads park on a [`Notify`] that every append wakes.
#[derive(Clone, Default)]
pub struct MemoryLogStore {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    logs: Mutex<HashMap<String, Vec<Entry>>>,
    appended: Notify,
}

impl MemoryLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored under `key`.
    pub fn len(&self, key: &str) -> usize {
        self.logs().map_or(0, |logs| logs.get(key).map_or(0, Vec::len))
    }

    /// Whether no key holds any entry.
    pub fn is_empty(&self) -> bool {
        self.logs().map_or(true, |logs| logs.is_empty())
    }

    /// Total number of entries across all keys.
    pub fn total_entry_count(&self) -> usize {
        self.logs().map_or(0, |logs| logs.values().map(Vec::len).sum())
    }

    fn logs(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Entry>>>, StoreError> {
        self.inner.logs.lock().map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    /// Entries of `key` after `after` (all when `None`), at most `limit`.
    fn collect(
        &self,
        key: &str,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        let logs = self.logs()?;
        let Some(entries) = logs.get(key) else {
            return Ok(Vec::new());
        };

        let start = after.map_or(0, |after| entries.partition_point(|entry| entry.id <= after));
        Ok(entries[start..].iter().take(limit).cloned().collect())
    }

    /// Exclusive lower bound for a read from `from`, resolving the tail
    /// against the current end of `key`.
    fn resolve(&self, key: &str, from: Cursor) -> Result<Option<EntryId>, StoreError> {
        Ok(match from {
            Cursor::Beginning => None,
            Cursor::After(id) => Some(id),
            Cursor::Tail => self.logs()?.get(key).and_then(|entries| entries.last()).map(|e| e.id),
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, key: &str, fields: &Fields) -> Result<EntryId, StoreError> {
        let id = {
            let mut logs = self.logs()?;
            let entries = logs.entry(key.to_string()).or_default();

            let last = entries.last().map_or(EntryId::MIN, |entry| entry.id);
            let id = last.successor(now_millis());
            debug_assert!(id > last);

            entries.push(Entry { id, fields: fields.clone() });
            id
        };

        self.inner.appended.notify_waiters();
        tracing::trace!(key, %id, "memory store append");
        Ok(id)
    }

    async fn read_range(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        if from == Cursor::Tail {
            return Ok(Vec::new());
        }
        self.collect(key, self.resolve(key, from)?, limit)
    }

    async fn read_blocking(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
        max_wait: Duration,
    ) -> Result<Vec<Entry>, StoreError> {
        let after = self.resolve(key, from)?;
        let deadline = (!max_wait.is_zero()).then(|| tokio::time::Instant::now() + max_wait);

        loop {
            // Register interest before checking so an append between the
            // check and the wait still wakes us.
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.collect(key, after, limit)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                },
            }
        }
    }

    async fn last_id(&self, key: &str) -> Result<Option<EntryId>, StoreError> {
        self.resolve(key, Cursor::Tail)
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let logs = self.logs()?;
        Ok(logs.keys().filter(|key| key.starts_with(prefix)).cloned().collect())
    }
}
