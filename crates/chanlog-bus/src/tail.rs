//! Live tailing of one channel.
//!
//! A [`Tail`] owns a spawned task that loops on blocking reads and forwards
//! decoded messages over a bounded channel. Cancellation is explicit and
//! awaited: once [`Tail::cancel`] returns, the task has exited and nothing
//! more is delivered.

use std::{sync::Arc, time::Duration};

use chanlog_store::{Cursor, Entry, LogStore, StoreError};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{Environment, Message};

/// Handle to a running tail.
///
/// Dropping the handle signals cancellation without waiting for the task.
pub struct Tail {
    channel: String,
    receiver: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    /// Last position handed to the consumer
    cursor: Cursor,
    cancelled: bool,
}

impl Tail {
    pub(crate) fn spawn<S: LogStore, E: Environment>(task: TailTask<S, E>) -> Self {
        let channel = task.channel.clone();
        let cursor = task.cursor;
        let cancel = task.cancel.clone();
        let (sender, receiver) = mpsc::channel(task.buffer.max(1));

        let handle = tokio::spawn(task.run(sender));

        Self { channel, receiver, cancel, task: Some(handle), cursor, cancelled: false }
    }

    /// Channel being tailed.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Position after the last message returned by [`Tail::next`].
    ///
    /// A new tail started from this cursor resumes without gaps or repeats.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Next live message, in store order.
    ///
    /// Waits until one arrives. Returns `None` once the tail has been
    /// cancelled or its task has given up. Cancel-safe.
    pub async fn next(&mut self) -> Option<Message> {
        if self.cancelled {
            return None;
        }
        let message = self.receiver.recv().await?;
        self.cursor = Cursor::After(message.id);
        Some(message)
    }

    /// Stop the tail and wait for its task to exit.
    ///
    /// Messages already buffered but not yet returned by [`Tail::next`] are
    /// discarded; [`Tail::cursor`] still points just past the last delivered
    /// one.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        self.cancelled = true;
        self.receiver.close();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(channel = %self.channel, error = %e, "tail task failed");
            }
        }
    }

    /// Whether the tail was cancelled or its task has exited.
    pub fn is_finished(&self) -> bool {
        self.cancelled || self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Tail {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State of the background loop behind a [`Tail`].
pub(crate) struct TailTask<S, E> {
    pub(crate) store: Arc<S>,
    pub(crate) env: E,
    pub(crate) channel: String,
    pub(crate) key: String,
    pub(crate) cursor: Cursor,
    pub(crate) poll_interval: Duration,
    pub(crate) retry_backoff: Duration,
    pub(crate) max_consecutive_failures: Option<u32>,
    pub(crate) batch_size: usize,
    pub(crate) buffer: usize,
    pub(crate) cancel: CancellationToken,
}

impl<S: LogStore, E: Environment> TailTask<S, E> {
    async fn run(mut self, sender: mpsc::Sender<Message>) {
        tracing::info!(channel = %self.channel, cursor = %self.cursor, "tail started");
        let mut failures: u32 = 0;

        'poll: loop {
            let (cursor, read) = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break 'poll,
                polled = self.poll() => polled,
            };
            self.cursor = cursor;

            match read {
                Ok(entries) => {
                    failures = 0;
                    let now = self.env.wall_clock_secs();

                    for entry in entries {
                        let message = Message::from_entry(entry, now);
                        let id = message.id;

                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => break 'poll,
                            sent = sender.send(message) => {
                                if sent.is_err() {
                                    // Receiver gone, nobody left to deliver to
                                    break 'poll;
                                }
                            },
                        }
                        self.cursor = Cursor::After(id);
                    }
                },
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        channel = %self.channel,
                        cursor = %self.cursor,
                        failures,
                        error = %e,
                        "tail read failed, retrying"
                    );

                    if self.max_consecutive_failures.is_some_and(|max| failures >= max) {
                        tracing::warn!(channel = %self.channel, failures, "tail giving up");
                        break 'poll;
                    }

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break 'poll,
                        () = self.env.sleep(self.retry_backoff) => {},
                    }
                },
            }
        }

        tracing::info!(channel = %self.channel, cursor = %self.cursor, "tail stopped");
    }

    /// One blocking read from the current cursor.
    ///
    /// [`Cursor::Tail`] is first pinned to the newest id, and the pinned
    /// cursor is returned even when the read itself fails, so entries
    /// appended during an outage are still delivered after it.
    async fn poll(&self) -> (Cursor, Result<Vec<Entry>, StoreError>) {
        let cursor = match self.cursor {
            Cursor::Tail => match self.store.last_id(&self.key).await {
                Ok(Some(id)) => Cursor::After(id),
                Ok(None) => Cursor::Beginning,
                Err(e) => return (Cursor::Tail, Err(e)),
            },
            cursor => cursor,
        };

        let read = self
            .store
            .read_blocking(&self.key, cursor, self.batch_size, self.poll_interval)
            .await;
        (cursor, read)
    }
}
