//! Environment abstraction for deterministic testing.
//!
//! Decouples bus logic from the wall clock and from real sleeping, so tests
//! can pin timestamps or run backoff under a paused tokio clock.

use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Wall clock and async sleep used by the bus.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch, with sub-second precision.
    ///
    /// Used to stamp published messages and to default missing timestamps on
    /// decode.
    fn wall_clock_secs(&self) -> f64;

    /// Sleeps for the specified duration.
    ///
    /// Only the tail's retry backoff sleeps; protocol logic never does.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production environment: system clock and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn wall_clock_secs(&self) -> f64 {
        // A clock before 1970 is a misconfigured host; stamp zero rather than fail
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |elapsed| elapsed.as_secs_f64())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
