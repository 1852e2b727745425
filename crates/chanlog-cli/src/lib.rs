//! Line-oriented chat client for chanlog.
//!
//! A thin presentation layer over [`chanlog_bus::ChannelBus`]: input lines
//! become bus calls and delivered messages become text lines. All ordering,
//! cursor and failure handling lives in the bus.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod error;
pub mod render;
mod session;

pub use command::{Command, NickError, validate_nick};
pub use error::CliError;
pub use session::{ChatSession, Flow};
