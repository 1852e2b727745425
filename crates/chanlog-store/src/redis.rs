//! Redis Streams backend.
//!
//! Each key is a stream. Appends use `XADD`, range reads `XRANGE` with an
//! exclusive start, blocking reads `XREAD BLOCK`, the newest id `XREVRANGE`,
//! and enumeration `KEYS`.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    Client,
    aio::{ConnectionManager, MultiplexedConnection},
};
use tokio::sync::Mutex;

use crate::{Cursor, Entry, EntryId, Fields, LogStore, StoreError};

/// Raw `XRANGE` entry: id plus flattened field pairs.
type RawEntry = (String, HashMap<String, String>);

/// Raw `XREAD` reply: one `(key, entries)` pair per requested stream. `None`
/// when the block timed out.
type RawStreams = Option<Vec<(String, Vec<RawEntry>)>>;

/// Log store backed by Redis Streams.
///
/// One-shot commands go through a [`ConnectionManager`], which reconnects on
/// its own after the server comes back. Blocking reads use a dedicated
/// connection so a pending `XREAD BLOCK` never queues appends behind it; that
/// connection is opened lazily and dropped on any error so the next read
/// reconnects.
#[derive(Clone)]
pub struct RedisLogStore {
    client: Client,
    commands: ConnectionManager,
    blocking: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisLogStore {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(StoreError::unavailable)?;
        let commands =
            ConnectionManager::new(client.clone()).await.map_err(StoreError::unavailable)?;

        tracing::info!(url, "connected to redis log store");
        Ok(Self { client, commands, blocking: Arc::new(Mutex::new(None)) })
    }

    /// Drop the blocking-read connection.
    ///
    /// The command connection closes when the last clone of the store drops.
    pub async fn close(&self) {
        self.blocking.lock().await.take();
        tracing::debug!("closed redis blocking connection");
    }
}

fn decode_entry((id, fields): RawEntry) -> Result<Entry, StoreError> {
    let id = id.parse::<EntryId>().map_err(StoreError::unavailable)?;
    Ok(Entry { id, fields: fields.into_iter().collect() })
}

/// Escape glob metacharacters so `prefix` matches literally in `KEYS`.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl LogStore for RedisLogStore {
    async fn append(&self, key: &str, fields: &Fields) -> Result<EntryId, StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(key).arg("*");
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }

        let mut conn = self.commands.clone();
        let id: String = cmd.query_async(&mut conn).await.map_err(StoreError::unavailable)?;

        tracing::debug!(key, %id, "XADD");
        id.parse().map_err(StoreError::unavailable)
    }

    async fn read_range(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        let start = match from {
            Cursor::Beginning => "-".to_string(),
            Cursor::Tail => return Ok(Vec::new()),
            Cursor::After(id) => format!("({id}"),
        };

        let mut conn = self.commands.clone();
        let raw: Vec<RawEntry> = redis::cmd("XRANGE")
            .arg(key)
            .arg(&start)
            .arg("+")
            .arg("COUNT")
            .arg(limit)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::unavailable)?;

        tracing::debug!(key, %start, count = raw.len(), "XRANGE");
        raw.into_iter().map(decode_entry).collect()
    }

    async fn read_blocking(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
        max_wait: Duration,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut cmd = redis::cmd("XREAD");
        cmd.arg("COUNT")
            .arg(limit)
            .arg("BLOCK")
            .arg(max_wait.as_millis() as u64)
            .arg("STREAMS")
            .arg(key)
            .arg(from.to_string());

        let mut guard = self.blocking.lock().await;
        if guard.is_none() {
            let conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(StoreError::unavailable)?;
            *guard = Some(conn);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StoreError::unavailable("blocking connection missing"));
        };

        let reply: Result<RawStreams, _> = cmd.query_async(conn).await;
        let streams = match reply {
            Ok(streams) => streams,
            Err(e) => {
                *guard = None;
                return Err(StoreError::unavailable(e));
            },
        };
        drop(guard);

        let entries: Vec<RawEntry> = streams
            .unwrap_or_default()
            .into_iter()
            .filter(|(stream, _)| stream == key)
            .flat_map(|(_, entries)| entries)
            .collect();

        tracing::debug!(key, cursor = %from, count = entries.len(), "XREAD");
        entries.into_iter().map(decode_entry).collect()
    }

    async fn last_id(&self, key: &str) -> Result<Option<EntryId>, StoreError> {
        let mut conn = self.commands.clone();
        let raw: Vec<RawEntry> = redis::cmd("XREVRANGE")
            .arg(key)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::unavailable)?;

        raw.into_iter().next().map(|entry| decode_entry(entry).map(|entry| entry.id)).transpose()
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let mut conn = self.commands.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(glob_escape(prefix))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::unavailable)?;

        tracing::debug!(prefix, count = keys.len(), "KEYS");
        Ok(keys.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_escape_matches_prefix_literally() {
        assert_eq!(glob_escape("chat:"), "chat:*");
        assert_eq!(glob_escape("a*b?"), "a\\*b\\?*");
    }

    #[test]
    fn decode_entry_rejects_malformed_ids() {
        let raw = ("not-an-id".to_string(), HashMap::new());
        assert!(matches!(decode_entry(raw), Err(StoreError::Unavailable(_))));

        let raw = ("5-1".to_string(), HashMap::from([("k".to_string(), "v".to_string())]));
        let entry = decode_entry(raw).unwrap();
        assert_eq!(entry.id, EntryId::new(5, 1));
        assert_eq!(entry.fields.get("k").map(String::as_str), Some("v"));
    }
}
