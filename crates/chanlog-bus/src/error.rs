//! Bus error types.

use chanlog_store::StoreError;
use thiserror::Error;

/// Why a bus operation did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Log store unreachable. Transient from the bus's point of view.
    #[error(transparent)]
    Unavailable(#[from] StoreError),

    /// Local precondition failed (unknown channel, empty or duplicate name).
    ///
    /// Always detected before any store call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BusError {
    pub(crate) fn unknown_channel(channel: &str) -> Self {
        Self::InvalidRequest(format!("unknown channel {channel:?}"))
    }
}
