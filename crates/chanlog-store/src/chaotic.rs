//! Chaotic log store wrapper for fault injection testing
//!
//! Wraps another store and fails operations either at random (seeded, so runs
//! are reproducible) or unconditionally while an outage is switched on. Used
//! to verify that the bus degrades to negative results and that live tails
//! survive outages.

#![allow(clippy::disallowed_types, reason = "Lock only guards the RNG state")]

use std::{
    collections::BTreeSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{Cursor, Entry, EntryId, Fields, LogStore, StoreError};

/// Log store wrapper that injects `Unavailable` failures.
///
/// Clones share the RNG, the outage switch and the counters, so a test keeps
/// one clone to flip the switch while the bus owns another.
#[derive(Clone)]
pub struct ChaoticLogStore<S> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Every operation fails while set
    outage: Arc<AtomicBool>,
    operation_count: Arc<AtomicUsize>,
    append_attempts: Arc<AtomicUsize>,
}

/// Linear congruential generator, so chaos runs are reproducible per seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: LogStore> ChaoticLogStore<S> {
    /// Wrap `inner` with no random failures; use [`Self::set_unavailable`] to
    /// simulate outages.
    pub fn new(inner: S) -> Self {
        Self::with_seed(inner, 0.0, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner`, failing each operation with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            outage: Arc::new(AtomicBool::new(false)),
            operation_count: Arc::new(AtomicUsize::new(0)),
            append_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Switch the simulated outage on or off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.outage.store(unavailable, Ordering::SeqCst);
    }

    /// Whether the simulated outage is on.
    pub fn is_unavailable(&self) -> bool {
        self.outage.load(Ordering::SeqCst)
    }

    /// Total number of store operations attempted, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::SeqCst)
    }

    /// Number of `append` calls attempted, failed ones included.
    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    /// Count the operation and decide whether it fails.
    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        self.operation_count.fetch_add(1, Ordering::SeqCst);

        if self.is_unavailable() {
            return Err(StoreError::unavailable(format!("{op}: simulated outage")));
        }

        let fail = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_fail(self.failure_rate);
        if fail {
            return Err(StoreError::unavailable(format!("{op}: chaotic failure injection")));
        }

        Ok(())
    }
}

#[async_trait]
impl<S: LogStore> LogStore for ChaoticLogStore<S> {
    async fn append(&self, key: &str, fields: &Fields) -> Result<EntryId, StoreError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        self.check("append")?;
        self.inner.append(key, fields).await
    }

    async fn read_range(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        self.check("read_range")?;
        self.inner.read_range(key, from, limit).await
    }

    async fn read_blocking(
        &self,
        key: &str,
        from: Cursor,
        limit: usize,
        max_wait: Duration,
    ) -> Result<Vec<Entry>, StoreError> {
        self.check("read_blocking")?;
        self.inner.read_blocking(key, from, limit, max_wait).await
    }

    async fn last_id(&self, key: &str) -> Result<Option<EntryId>, StoreError> {
        self.check("last_id")?;
        self.inner.last_id(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        self.check("list_keys")?;
        self.inner.list_keys(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLogStore;

    fn fields() -> Fields {
        Fields::from([("message".to_string(), "x".to_string())])
    }

    #[tokio::test]
    async fn zero_failure_rate_never_fails() {
        let chaotic = ChaoticLogStore::new(MemoryLogStore::new());

        for _ in 0..100 {
            chaotic.append("k", &fields()).await.expect("should not fail with 0% rate");
        }

        assert_eq!(chaotic.inner().len("k"), 100);
        assert_eq!(chaotic.append_attempts(), 100);
    }

    #[tokio::test]
    async fn full_failure_rate_always_fails() {
        let chaotic = ChaoticLogStore::with_seed(MemoryLogStore::new(), 1.0, 7);

        assert!(chaotic.append("k", &fields()).await.is_err());
        assert!(chaotic.read_range("k", Cursor::Beginning, 10).await.is_err());
        assert!(chaotic.list_keys("").await.is_err());
        assert!(chaotic.inner().is_empty());
    }

    #[tokio::test]
    async fn outage_switch_fails_every_operation_until_cleared() {
        let chaotic = ChaoticLogStore::new(MemoryLogStore::new());

        chaotic.set_unavailable(true);
        assert!(matches!(
            chaotic.append("k", &fields()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(
            chaotic
                .read_blocking("k", Cursor::Beginning, 10, Duration::from_millis(1))
                .await
                .is_err()
        );

        chaotic.set_unavailable(false);
        chaotic.append("k", &fields()).await.expect("store recovered");
        assert_eq!(chaotic.inner().len("k"), 1);
        assert_eq!(chaotic.operation_count(), 3);
    }

    #[tokio::test]
    async fn same_seed_gives_same_failure_pattern() {
        let chaotic1 = ChaoticLogStore::with_seed(MemoryLogStore::new(), 0.5, 42);
        let chaotic2 = ChaoticLogStore::with_seed(MemoryLogStore::new(), 0.5, 42);

        for i in 0..100 {
            let result1 = chaotic1.append("k", &fields()).await;
            let result2 = chaotic2.append("k", &fields()).await;
            assert_eq!(result1.is_ok(), result2.is_ok(), "determinism violated at iteration {i}");
        }
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn rejects_invalid_failure_rate() {
        let _chaotic = ChaoticLogStore::with_seed(MemoryLogStore::new(), 1.5, 0);
    }
}
