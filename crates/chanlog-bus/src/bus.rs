//! Channel bus: channel registry plus publish, history and tail over a log
//! store.

use std::{collections::BTreeSet, sync::Arc};

use chanlog_store::{Cursor, EntryId, LogStore};
use tokio_util::sync::CancellationToken;

use crate::{
    BusConfig, BusError, ChannelRegistry, Environment, Message, SystemEnv,
    message::{system_fields, user_fields},
    tail::{Tail, TailTask},
};

/// Domain layer over a [`LogStore`].
///
/// Owns the process's [`ChannelRegistry`]. One-shot operations come in two
/// flavours: `try_*` returns the reason for failure, the plain form folds any
/// failure into `false` or an empty result and logs it. Nothing here panics or
/// raises across the presentation boundary.
pub struct ChannelBus<S, E = SystemEnv> {
    store: Arc<S>,
    env: E,
    config: BusConfig,
    registry: ChannelRegistry,
}

impl<S: LogStore> ChannelBus<S, SystemEnv> {
    /// Bus over `store` with default configuration and the system clock.
    pub fn new(store: S) -> Self {
        Self::with_config(store, SystemEnv::new(), BusConfig::default())
    }
}

impl<S: LogStore, E: Environment> ChannelBus<S, E> {
    /// Bus over `store` with an explicit environment and configuration.
    pub fn with_config(store: S, env: E, config: BusConfig) -> Self {
        let registry = ChannelRegistry::new(config.key_prefix.clone());
        Self { store: Arc::new(store), env, config, registry }
    }

    /// Underlying log store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Channel registry.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Known channel names, sorted.
    pub fn channels(&self) -> BTreeSet<String> {
        self.registry.names()
    }

    /// Whether `channel` is known to this bus.
    pub fn contains(&self, channel: &str) -> bool {
        self.registry.contains(channel)
    }

    /// Create `name` by appending a system announcement, then register it.
    ///
    /// Empty and already-registered names are rejected before touching the
    /// store, as is a name whose creation is already in flight. On store
    /// failure the channel stays unregistered and the name is released.
    pub async fn try_create_channel(&self, name: &str) -> Result<EntryId, BusError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BusError::InvalidRequest("empty channel name".to_string()));
        }
        // Held across the append so a concurrent create of the same name
        // fails here instead of appending a second announcement
        let Some(reservation) = self.registry.reserve(name) else {
            return Err(BusError::InvalidRequest(format!("channel {name:?} already exists")));
        };

        let key = self.registry.key_for(name);
        let fields = system_fields(&format!("Canal {name} criado"), self.env.wall_clock_secs());
        let id = self.store.append(&key, &fields).await?;

        reservation.commit();
        tracing::info!(channel = name, %id, "channel created");
        Ok(id)
    }

    /// [`Self::try_create_channel`], reporting only success.
    pub async fn create_channel(&self, name: &str) -> bool {
        match self.try_create_channel(name).await {
            Ok(_) => true,
            Err(e) => {
                log_failure("create_channel", name, &e);
                false
            },
        }
    }

    /// Append a user message to a registered channel.
    pub async fn try_publish(
        &self,
        channel: &str,
        author: &str,
        body: &str,
    ) -> Result<EntryId, BusError> {
        let key = self.key_of(channel)?;
        let fields = user_fields(author, body, self.env.wall_clock_secs());
        let id = self.store.append(&key, &fields).await?;

        tracing::debug!(channel, author, %id, "published");
        Ok(id)
    }

    /// [`Self::try_publish`], reporting only success.
    pub async fn publish(&self, channel: &str, author: &str, body: &str) -> bool {
        match self.try_publish(channel, author, body).await {
            Ok(_) => true,
            Err(e) => {
                log_failure("publish", channel, &e);
                false
            },
        }
    }

    /// Append a system message announcing that `old` is now known as `new`.
    pub async fn try_announce_nickname_change(
        &self,
        channel: &str,
        old: &str,
        new: &str,
    ) -> Result<EntryId, BusError> {
        let key = self.key_of(channel)?;
        let body = format!("{old} agora é conhecido como {new}");
        let id = self.store.append(&key, &system_fields(&body, self.env.wall_clock_secs())).await?;

        tracing::debug!(channel, old, new, %id, "nickname change announced");
        Ok(id)
    }

    /// [`Self::try_announce_nickname_change`], reporting only success.
    pub async fn announce_nickname_change(&self, channel: &str, old: &str, new: &str) -> bool {
        match self.try_announce_nickname_change(channel, old, new).await {
            Ok(_) => true,
            Err(e) => {
                log_failure("announce_nickname_change", channel, &e);
                false
            },
        }
    }

    /// Full backlog of `channel`, oldest first.
    ///
    /// Reads page by page from the beginning of the log until a short page.
    /// Never blocks waiting for new entries.
    pub async fn try_history(&self, channel: &str) -> Result<Vec<Message>, BusError> {
        let key = self.key_of(channel)?;
        let page_size = self.config.history_page_size.max(1);

        let mut messages: Vec<Message> = Vec::new();
        let mut cursor = Cursor::Beginning;
        loop {
            let page = self.store.read_range(&key, cursor, page_size).await?;
            let full = page.len() >= page_size;

            let now = self.env.wall_clock_secs();
            messages.extend(page.into_iter().map(|entry| Message::from_entry(entry, now)));

            match messages.last() {
                Some(last) if full => cursor = Cursor::After(last.id),
                _ => break,
            }
        }

        tracing::debug!(channel, count = messages.len(), "history loaded");
        Ok(messages)
    }

    /// [`Self::try_history`], empty on any failure.
    pub async fn history(&self, channel: &str) -> Vec<Message> {
        self.try_history(channel).await.unwrap_or_else(|e| {
            log_failure("history", channel, &e);
            Vec::new()
        })
    }

    /// Start tailing `channel` from `from`.
    ///
    /// The returned [`Tail`] yields every message positioned after `from` as
    /// it is appended, in store order. Store outages do not end it: the task
    /// backs off and retries (up to `max_consecutive_failures`, if set).
    /// Must be called within a tokio runtime.
    pub fn tail(&self, channel: &str, from: Cursor) -> Result<Tail, BusError> {
        let key = self.key_of(channel)?;

        Ok(Tail::spawn(TailTask {
            store: Arc::clone(&self.store),
            env: self.env.clone(),
            channel: channel.to_string(),
            key,
            cursor: from,
            poll_interval: self.config.poll_interval,
            retry_backoff: self.config.retry_backoff,
            max_consecutive_failures: self.config.max_consecutive_failures,
            batch_size: self.config.tail_batch_size.max(1),
            buffer: self.config.tail_buffer,
            cancel: CancellationToken::new(),
        }))
    }

    /// Enumerate backing logs and merge their channels into the registry.
    ///
    /// Returns the channels found in the store, sorted. Known channels are
    /// never removed, even if the store no longer lists them.
    pub async fn try_discover_channels(&self) -> Result<BTreeSet<String>, BusError> {
        let keys = self.store.list_keys(&self.config.key_prefix).await?;

        let found: BTreeSet<String> = keys
            .iter()
            .filter_map(|key| self.registry.name_for(key))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let added = self.registry.merge(found.iter().map(String::as_str));
        if added > 0 {
            tracing::info!(added, total = self.registry.len(), "discovered channels");
        }
        Ok(found)
    }

    /// [`Self::try_discover_channels`], empty on failure.
    pub async fn discover_channels(&self) -> BTreeSet<String> {
        self.try_discover_channels().await.unwrap_or_else(|e| {
            log_failure("discover_channels", &self.config.key_prefix, &e);
            BTreeSet::new()
        })
    }

    /// Startup: discover existing channels, then create any configured
    /// default channel still missing. Returns the known channels.
    pub async fn bootstrap(&self) -> BTreeSet<String> {
        self.discover_channels().await;

        for name in &self.config.default_channels {
            if !self.registry.contains(name) {
                self.create_channel(name).await;
            }
        }

        self.channels()
    }

    fn key_of(&self, channel: &str) -> Result<String, BusError> {
        self.registry.get(channel).ok_or_else(|| BusError::unknown_channel(channel))
    }
}

fn log_failure(op: &'static str, subject: &str, error: &BusError) {
    match error {
        BusError::Unavailable(_) => {
            tracing::warn!(op, subject, error = %error, "store unavailable");
        },
        BusError::InvalidRequest(_) => {
            tracing::debug!(op, subject, error = %error, "rejected");
        },
    }
}
