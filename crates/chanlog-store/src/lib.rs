//! Log store client for chanlog.
//!
//! Typed interface to an external append-only log service: string keys, each
//! holding an ordered sequence of entries. Every entry is a flat field map
//! tagged with a store-assigned [`EntryId`]. Ids increase monotonically within
//! a key and are not comparable across keys.
//!
//! # Components
//!
//! - [`LogStore`]: async trait over append, range read, blocking read and key
//!   enumeration
//! - [`MemoryLogStore`]: in-process log service for tests and offline use
//! - [`ChaoticLogStore`]: fault-injection wrapper for outage testing
//! - `RedisLogStore`: Redis Streams backend (feature `redis`)
//!
//! This layer never retries. Every transport failure surfaces as
//! [`StoreError::Unavailable`] and the caller decides what to do with it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chaotic;
mod error;
mod id;
mod memory;
#[cfg(feature = "redis")]
mod redis;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use async_trait::async_trait;
pub use chaotic::ChaoticLogStore;
pub use error::{ParseIdError, StoreError};
pub use id::{Cursor, EntryId};
pub use memory::MemoryLogStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisLogStore;

/// Field map carried by one log entry.
pub type Fields = BTreeMap<String, String>;

/// One entry read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Store-assigned id, unique and ordered within the entry's key.
    pub id: EntryId,
    /// Flat field map as appended.
    pub fields: Fields,
}

/// Append-only, per-key ordered log service.
///
/// Implementations own connection lifecycle only. Calls are independent
/// round-trips; no method retries on failure.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Append one entry to `key`, creating the key if it does not exist.
    ///
    /// # Invariants
    ///
    /// - Post: returned id is strictly greater than every id already in `key`
    /// - Fails only when the transport is down
    async fn append(&self, key: &str, fields: &Fields) -> Result<EntryId, StoreError>;

    /// Entries of `key` positioned after `from`, at most `limit`, oldest first.
    ///
    /// Never blocks. [`Cursor::Tail`] always yields nothing; an unknown key
    /// yields nothing.
    async fn read_range(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Wait up to `max_wait` for entries of `key` positioned after `from`.
    ///
    /// `Duration::ZERO` waits indefinitely. [`Cursor::Tail`] is resolved to the
    /// end of the log when the call starts. A timeout returns an empty batch,
    /// never an error.
    async fn read_blocking(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
        max_wait: Duration,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Id of the newest entry of `key`, `None` if the key is empty or absent.
    ///
    /// Pins [`Cursor::Tail`] to a concrete position, so a reader that has to
    /// retry does not skip entries appended in between.
    async fn last_id(&self, key: &str) -> Result<Option<EntryId>, StoreError>;

    /// All existing keys starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError>;
}
