//! Client error types.

use std::io;

use chanlog_store::StoreError;
use thiserror::Error;

use crate::NickError;

/// Errors that end the client.
///
/// Bus failures during chat are reported inline and never end the session;
/// only startup problems and terminal I/O land here.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Could not reach the log store at startup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Nickname given on the command line is unusable.
    #[error("invalid nickname: {0}")]
    Nick(#[from] NickError),
}
