//! Bus configuration.

use std::time::Duration;

/// Tunables for a [`ChannelBus`](crate::ChannelBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Prefix joining a channel name to its backing log key.
    pub key_prefix: String,
    /// Longest a single blocking read waits before the tail loops.
    ///
    /// Bounds how long a tail takes to notice cancellation while idle.
    pub poll_interval: Duration,
    /// Pause after a failed store read before the tail retries.
    pub retry_backoff: Duration,
    /// End the tail after this many consecutive store failures.
    ///
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Entries fetched per round-trip when replaying history.
    pub history_page_size: usize,
    /// Entries fetched per blocking read while tailing.
    pub tail_batch_size: usize,
    /// Messages a tail may buffer ahead of its consumer.
    pub tail_buffer: usize,
    /// Channels created at bootstrap when absent.
    pub default_channels: Vec<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            key_prefix: "chat:".to_string(),
            poll_interval: Duration::from_millis(1000),
            retry_backoff: Duration::from_secs(1),
            max_consecutive_failures: None,
            history_page_size: 100,
            tail_batch_size: 100,
            tail_buffer: 64,
            default_channels: vec!["geral".to_string(), "random".to_string()],
        }
    }
}
