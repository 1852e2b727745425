//! Channel message bus for chanlog.
//!
//! Named channels layered on an append-only log store: each channel is one
//! log key (`"chat:" + name`), messages are log entries, and the store's ids
//! give the only ordering there is.
//!
//! # Components
//!
//! - [`ChannelBus`]: channel creation, publish, history, tail, discovery
//! - [`Tail`]: live delivery from a cursor, with awaited cancellation
//! - [`Subscription`]: one consumer's history-then-tail state machine that
//!   keeps a single tail active at a time
//! - [`ChannelRegistry`]: cache of known channels
//! - [`Environment`]: clock and sleep, swappable in tests
//!
//! # Failure handling
//!
//! The store reports a single failure kind, `Unavailable`. One-shot bus
//! operations turn it into `false` or an empty result (the `try_*` variants
//! return it instead); a tail treats it as transient and retries after a
//! backoff.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bus;
mod config;
mod env;
mod error;
mod message;
mod registry;
mod subscription;
mod tail;

pub use bus::ChannelBus;
pub use chanlog_store::{Cursor, EntryId};
pub use config::BusConfig;
pub use env::{Environment, SystemEnv};
pub use error::BusError;
pub use message::{Message, MessageKind, SYSTEM_AUTHOR};
pub use registry::{ChannelRegistry, Reservation};
pub use subscription::{Subscription, SubscriptionState};
pub use tail::Tail;
