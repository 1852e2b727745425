//! Channel bus behavior tests
//!
//! One-shot operations: creation, publish, history, discovery, bootstrap, and
//! how each degrades when the store is unavailable.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "test helpers")]

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;

use chanlog_bus::{
    BusConfig, BusError, ChannelBus, Environment, MessageKind, SYSTEM_AUTHOR, SystemEnv,
};
use chanlog_store::{
    ChaoticLogStore, Cursor, Entry, EntryId, Fields, LogStore, MemoryLogStore, StoreError,
};

// Test environment with a pinned wall clock
#[derive(Clone)]
struct FixedClockEnv(f64);

impl Environment for FixedClockEnv {
    fn wall_clock_secs(&self) -> f64 {
        self.0
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

fn chaotic_bus() -> (ChannelBus<ChaoticLogStore<MemoryLogStore>>, ChaoticLogStore<MemoryLogStore>) {
    let store = ChaoticLogStore::new(MemoryLogStore::new());
    (ChannelBus::new(store.clone()), store)
}

#[tokio::test]
async fn create_publish_history_end_to_end() {
    let bus = ChannelBus::new(MemoryLogStore::new());

    assert!(bus.create_channel("geral").await);
    assert!(bus.publish("geral", "Alice", "hi").await);

    let history = bus.history("geral").await;
    assert_eq!(history.len(), 2);

    assert_eq!(history[0].kind, MessageKind::System);
    assert_eq!(history[0].author, SYSTEM_AUTHOR);
    assert_eq!(history[0].body, "Canal geral criado");

    assert_eq!(history[1].kind, MessageKind::UserMessage);
    assert_eq!(history[1].author, "Alice");
    assert_eq!(history[1].body, "hi");
    assert!(history[0].id < history[1].id);
}

#[tokio::test]
async fn unknown_channel_publish_and_history() {
    let bus = ChannelBus::new(MemoryLogStore::new());

    assert!(!bus.publish("nao-existe", "Bob", "oi").await);
    assert!(bus.history("nao-existe").await.is_empty());
    assert!(matches!(
        bus.try_publish("nao-existe", "Bob", "oi").await,
        Err(BusError::InvalidRequest(_))
    ));
    assert!(bus.store().is_empty());
}

#[tokio::test]
async fn unknown_channel_publish_never_reaches_store() {
    let (bus, store) = chaotic_bus();

    assert!(!bus.publish("nao-existe", "Bob", "oi").await);
    assert!(!bus.announce_nickname_change("nao-existe", "Bob", "Robert").await);

    assert_eq!(store.append_attempts(), 0);
    assert_eq!(store.operation_count(), 0);
}

#[tokio::test]
async fn creation_message_precedes_every_publish() {
    let bus = ChannelBus::new(MemoryLogStore::new());
    assert!(bus.create_channel("dev").await);

    let history = bus.history("dev").await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_system());

    for body in ["a", "b", "c"] {
        assert!(bus.publish("dev", "Carol", body).await);
    }

    let history = bus.history("dev").await;
    assert!(history[1..].iter().all(|m| m.id > history[0].id));
}

#[tokio::test]
async fn publish_stamps_the_environment_clock() {
    let bus = ChannelBus::with_config(
        MemoryLogStore::new(),
        FixedClockEnv(1_700_000_000.25),
        BusConfig::default(),
    );
    bus.create_channel("geral").await;
    bus.publish("geral", "Alice", "hi").await;

    for message in bus.history("geral").await {
        assert!((message.timestamp - 1_700_000_000.25).abs() < 1e-6);
    }
}

#[tokio::test]
async fn create_channel_fails_cleanly_when_store_is_down() {
    let (bus, store) = chaotic_bus();
    store.set_unavailable(true);

    assert!(!bus.create_channel("geral").await);
    assert!(!bus.contains("geral"));
    assert!(matches!(bus.try_create_channel("geral").await, Err(BusError::Unavailable(_))));

    store.set_unavailable(false);
    assert!(bus.create_channel("geral").await);
    assert_eq!(store.inner().len("chat:geral"), 1);
}

#[tokio::test]
async fn publish_and_history_degrade_when_store_is_down() {
    let (bus, store) = chaotic_bus();
    assert!(bus.create_channel("geral").await);

    store.set_unavailable(true);
    assert!(!bus.publish("geral", "Alice", "hi").await);
    assert!(bus.history("geral").await.is_empty());
    assert!(bus.contains("geral"));

    store.set_unavailable(false);
    assert_eq!(bus.history("geral").await.len(), 1);
}

#[tokio::test]
async fn nickname_change_is_a_system_message() {
    let bus = ChannelBus::new(MemoryLogStore::new());
    bus.create_channel("geral").await;

    assert!(bus.announce_nickname_change("geral", "Usuario", "Alice").await);

    let history = bus.history("geral").await;
    let last = history.last().expect("announcement");
    assert_eq!(last.kind, MessageKind::System);
    assert_eq!(last.author, SYSTEM_AUTHOR);
    assert_eq!(last.body, "Usuario agora é conhecido como Alice");
}

#[tokio::test]
async fn discovery_finds_channels_created_elsewhere() {
    let store = MemoryLogStore::new();
    let writer = ChannelBus::new(store.clone());
    writer.create_channel("geral").await;
    writer.create_channel("random").await;
    store.append("unrelated", &Default::default()).await.unwrap();

    let reader = ChannelBus::new(store);
    assert!(!reader.contains("geral"));

    let found = reader.discover_channels().await;
    assert_eq!(found.into_iter().collect::<Vec<_>>(), ["geral", "random"]);
    assert!(reader.publish("geral", "Bob", "oi").await);
}

#[tokio::test]
async fn discovery_is_idempotent() {
    let store = MemoryLogStore::new();
    let bus = ChannelBus::new(store.clone());
    bus.create_channel("a").await;
    bus.create_channel("b").await;

    let first = bus.discover_channels().await;
    let second = bus.discover_channels().await;

    assert_eq!(first, second);
    assert_eq!(bus.channels(), first);
}

#[tokio::test]
async fn discovery_failure_keeps_registry() {
    let (bus, store) = chaotic_bus();
    bus.create_channel("geral").await;

    store.set_unavailable(true);
    assert!(bus.discover_channels().await.is_empty());
    assert!(matches!(bus.try_discover_channels().await, Err(BusError::Unavailable(_))));
    assert!(bus.contains("geral"));
}

#[tokio::test]
async fn bootstrap_creates_defaults_and_is_repeatable() {
    let store = MemoryLogStore::new();
    let bus = ChannelBus::new(store.clone());

    let channels = bus.bootstrap().await;
    assert_eq!(channels.into_iter().collect::<Vec<_>>(), ["geral", "random"]);

    let again = ChannelBus::new(store.clone()).bootstrap().await;
    assert_eq!(again.len(), 2);
    assert_eq!(store.len("chat:geral"), 1);
    assert_eq!(store.len("chat:random"), 1);
}

#[tokio::test]
async fn bootstrap_with_store_down_leaves_registry_empty() {
    let store = ChaoticLogStore::new(MemoryLogStore::new());
    store.set_unavailable(true);
    let bus = ChannelBus::with_config(store.clone(), SystemEnv::new(), BusConfig::default());

    assert!(bus.bootstrap().await.is_empty());
    assert!(store.inner().is_empty());
}

// Store whose appends suspend once before completing, so concurrent callers
// interleave at the append
#[derive(Clone, Default)]
struct YieldingStore(MemoryLogStore);

#[async_trait]
impl LogStore for YieldingStore {
    async fn append(&self, key: &str, fields: &Fields) -> Result<EntryId, StoreError> {
        tokio::task::yield_now().await;
        self.0.append(key, fields).await
    }

    async fn read_range(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        self.0.read_range(key, from, limit).await
    }

    async fn read_blocking(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
        max_wait: Duration,
    ) -> Result<Vec<Entry>, StoreError> {
        self.0.read_blocking(key, from, limit, max_wait).await
    }

    async fn last_id(&self, key: &str) -> Result<Option<EntryId>, StoreError> {
        self.0.last_id(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        self.0.list_keys(prefix).await
    }
}

#[tokio::test]
async fn concurrent_creates_of_same_name_append_once() {
    let store = YieldingStore::default();
    let bus = ChannelBus::new(store.clone());

    let (a, b) = tokio::join!(bus.create_channel("dev"), bus.create_channel("dev"));

    assert!(a ^ b, "exactly one create should succeed, got {a} and {b}");
    assert_eq!(store.0.len("chat:dev"), 1);
    assert!(bus.contains("dev"));
}

#[tokio::test]
async fn concurrent_create_is_rejected_while_first_is_in_flight() {
    let bus = ChannelBus::new(YieldingStore::default());

    let (first, second) =
        tokio::join!(bus.try_create_channel("dev"), bus.try_create_channel("dev"));

    assert!(first.is_ok());
    assert!(matches!(second, Err(BusError::InvalidRequest(_))));
}
