//! Channel registry.
//!
//! Cache of channel name to backing log key. The log store stays the source
//! of truth; the registry only grows, by creation or by discovery.

#![allow(clippy::disallowed_types, reason = "Lock is never held across an await")]

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Known channels and their backing keys.
#[derive(Debug)]
pub struct ChannelRegistry {
    prefix: String,
    channels: RwLock<Channels>,
}

#[derive(Debug, Default)]
struct Channels {
    known: BTreeMap<String, String>,
    /// Names whose creation is in flight. Not yet visible as channels.
    pending: BTreeSet<String>,
}

impl ChannelRegistry {
    /// Empty registry deriving keys as `prefix + name`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), channels: RwLock::new(Channels::default()) }
    }

    /// Backing key for `name`, whether or not it is registered.
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Channel name for a backing key, `None` if the key lacks the prefix.
    pub fn name_for<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix.as_str())
    }

    /// Backing key of a registered channel.
    pub fn get(&self, name: &str) -> Option<String> {
        self.read().known.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().known.contains_key(name)
    }

    /// Register `name`. Returns false if it was already known.
    pub fn insert(&self, name: &str) -> bool {
        let key = self.key_for(name);
        let mut channels = self.write();
        if channels.known.contains_key(name) {
            return false;
        }
        channels.known.insert(name.to_string(), key);
        true
    }

    /// Claim `name` for creation.
    ///
    /// Returns `None` if the channel is already registered or another
    /// creation of it is in flight. The name stays invisible to [`get`] and
    /// [`contains`] until the reservation is committed; dropping it
    /// uncommitted releases the name.
    ///
    /// [`get`]: Self::get
    /// [`contains`]: Self::contains
    pub fn reserve(&self, name: &str) -> Option<Reservation<'_>> {
        let mut channels = self.write();
        if channels.known.contains_key(name) || !channels.pending.insert(name.to_string()) {
            return None;
        }
        Some(Reservation { registry: self, name: name.to_string(), committed: false })
    }

    /// Register every name not yet known. Returns how many were new.
    pub fn merge<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> usize {
        let mut channels = self.write();
        let mut added = 0;
        for name in names {
            if !channels.known.contains_key(name) {
                channels.known.insert(name.to_string(), format!("{}{name}", self.prefix));
                added += 1;
            }
        }
        added
    }

    /// Registered channel names, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        self.read().known.keys().cloned().collect()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.read().known.len()
    }

    /// Whether no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Channels> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Channels> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on a channel name while its creation is in flight.
#[derive(Debug)]
pub struct Reservation<'r> {
    registry: &'r ChannelRegistry,
    name: String,
    committed: bool,
}

impl Reservation<'_> {
    /// Register the reserved name as a channel.
    pub fn commit(mut self) {
        let key = self.registry.key_for(&self.name);
        let mut channels = self.registry.write();
        channels.pending.remove(&self.name);
        channels.known.entry(self.name.clone()).or_insert(key);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.write().pending.remove(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_derived_from_prefix() {
        let registry = ChannelRegistry::new("chat:");
        assert_eq!(registry.key_for("geral"), "chat:geral");
        assert_eq!(registry.name_for("chat:geral"), Some("geral"));
        assert_eq!(registry.name_for("other:geral"), None);
    }

    #[test]
    fn insert_rejects_duplicates() {
        let registry = ChannelRegistry::new("chat:");

        assert!(registry.insert("geral"));
        assert!(!registry.insert("geral"));
        assert_eq!(registry.get("geral").as_deref(), Some("chat:geral"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn merge_only_adds() {
        let registry = ChannelRegistry::new("chat:");
        registry.insert("geral");

        assert_eq!(registry.merge(["geral", "random", "dev"]), 2);
        assert_eq!(registry.merge(Vec::<&str>::new()), 0);
        assert_eq!(
            registry.names().into_iter().collect::<Vec<_>>(),
            vec!["dev".to_string(), "geral".to_string(), "random".to_string()]
        );
    }

    #[test]
    fn reservation_is_exclusive_until_released() {
        let registry = ChannelRegistry::new("chat:");

        let first = registry.reserve("dev").unwrap();
        assert!(registry.reserve("dev").is_none());
        assert!(!registry.contains("dev"));

        drop(first);
        assert!(registry.reserve("dev").is_some());
    }

    #[test]
    fn committed_reservation_registers_channel() {
        let registry = ChannelRegistry::new("chat:");

        registry.reserve("dev").unwrap().commit();

        assert_eq!(registry.get("dev").as_deref(), Some("chat:dev"));
        assert!(registry.reserve("dev").is_none());
    }
}
