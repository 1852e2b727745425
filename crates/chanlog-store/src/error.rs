//! Store error types.

use std::fmt::Display;

use thiserror::Error;

/// Failure talking to the log service.
///
/// Transport failure is the only kind of failure the store reports. Missing
/// keys are not errors: appends create them and reads return nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Log service unreachable, connection dropped, or reply unusable.
    #[error("log store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Wrap any transport-level error as [`StoreError::Unavailable`].
    pub fn unavailable(reason: impl Display) -> Self {
        Self::Unavailable(reason.to_string())
    }
}

/// Text that is not a valid `<millis>-<sequence>` entry id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid entry id: {0:?}")]
pub struct ParseIdError(pub String);
