//! Per-consumer channel subscription.
//!
//! Drives one consumer through `Idle → HistoryLoaded → Tailing → Cancelled`
//! (or `Ended` when the tail gives up on the store) and holds at most one
//! [`Tail`] at a time. Selecting another channel cancels the previous tail and
//! waits for its task to exit before the new one starts, so two channels never
//! feed the same consumer concurrently.

use std::sync::Arc;

use chanlog_store::{Cursor, LogStore};

use crate::{BusError, ChannelBus, Environment, Message, SystemEnv, Tail};

/// Lifecycle of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Channel chosen (or nothing yet); no history read.
    Idle,
    /// Backlog delivered; live tail not yet running.
    HistoryLoaded,
    /// Live tail running.
    Tailing,
    /// Tail stopped by the consumer.
    Cancelled,
    /// Tail gave up after `max_consecutive_failures` store failures. Select a
    /// channel again to resume.
    Ended,
}

/// A consumer's view of one channel at a time.
pub struct Subscription<S, E = SystemEnv> {
    bus: Arc<ChannelBus<S, E>>,
    state: SubscriptionState,
    channel: Option<String>,
    cursor: Cursor,
    tail: Option<Tail>,
}

impl<S: LogStore, E: Environment> Subscription<S, E> {
    /// Subscription with no channel selected.
    pub fn new(bus: Arc<ChannelBus<S, E>>) -> Self {
        Self {
            bus,
            state: SubscriptionState::Idle,
            channel: None,
            cursor: Cursor::Beginning,
            tail: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Selected channel, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Position just past the last message delivered, from history or live.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Switch to `channel`: stop any running tail, replay the backlog, then
    /// start tailing right after it.
    ///
    /// Returns the backlog. An unknown channel is rejected after the previous
    /// tail has been stopped. If the store is unavailable the backlog comes
    /// back empty and the tail starts from the beginning, so it delivers the
    /// backlog once the store recovers.
    pub async fn select(&mut self, channel: &str) -> Result<Vec<Message>, BusError> {
        self.stop_tail().await;

        if !self.bus.contains(channel) {
            self.channel = None;
            self.state = SubscriptionState::Cancelled;
            return Err(BusError::unknown_channel(channel));
        }

        self.channel = Some(channel.to_string());
        self.cursor = Cursor::Beginning;
        self.state = SubscriptionState::Idle;

        let history = match self.bus.try_history(channel).await {
            Ok(history) => history,
            Err(BusError::Unavailable(e)) => {
                tracing::warn!(channel, error = %e, "history unavailable, tailing from start");
                Vec::new()
            },
            Err(e) => return Err(e),
        };
        if let Some(last) = history.last() {
            self.cursor = Cursor::After(last.id);
        }
        self.state = SubscriptionState::HistoryLoaded;

        self.tail = Some(self.bus.tail(channel, self.cursor)?);
        self.state = SubscriptionState::Tailing;

        tracing::debug!(channel, backlog = history.len(), "subscribed");
        Ok(history)
    }

    /// Next live message on the selected channel.
    ///
    /// Returns `None` when nothing is being tailed or the tail has ended.
    /// Cancel-safe.
    pub async fn next(&mut self) -> Option<Message> {
        let tail = self.tail.as_mut()?;
        let Some(message) = tail.next().await else {
            tracing::warn!(channel = tail.channel(), cursor = %self.cursor, "tail ended");
            self.tail = None;
            self.state = SubscriptionState::Ended;
            return None;
        };
        self.cursor = Cursor::After(message.id);
        Some(message)
    }

    /// Stop the live tail and wait for it to exit.
    pub async fn cancel(&mut self) {
        self.stop_tail().await;
        self.state = SubscriptionState::Cancelled;
    }

    async fn stop_tail(&mut self) {
        if let Some(mut tail) = self.tail.take() {
            tail.cancel().await;
            tracing::debug!(channel = tail.channel(), "subscription tail stopped");
        }
    }
}
