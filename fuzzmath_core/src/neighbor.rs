use num_bigint::BigUint;
use num_traits::One;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised while building neighbor counts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NeighborError {
    /// The requested distance is larger than the vector it is measured in.
    #[error("Distance {k} exceeds vector length {n}")]
    DistanceExceedsLength { n: u32, k: u32 },
}

/// The combinatorial shape of a Hamming ball of radius `k` in `{0,1}^n`.
///
/// * `total` is `Σ_{i=0}^{k} C(n, i)`, the number of vectors within distance `k`
///   of a reference vector (the reference itself included).
/// * `last` is `C(n, k)`, the final term of that sum. Keeping it lets rank queries
///   walk backward from `k` instead of rebuilding the whole sum.
///
/// Entries are immutable once built and are shared out of a [`NeighborCache`]
/// behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    total: BigUint,
    last: BigUint,
}

impl NeighborEntry {
    /// Builds the entry for `(n, k)` with the incremental binomial recurrence
    /// `C(n, i) = C(n, i - 1) * (n - i + 1) / i`.
    ///
    /// Every division is exact, so all intermediates stay integral and the
    /// cost is linear in `k`.
    pub fn compute(n: u32, k: u32) -> Result<Self, NeighborError> {
        if k > n {
            return Err(NeighborError::DistanceExceedsLength { n, k });
        }

        let mut total = BigUint::one();
        let mut term = BigUint::one();
        for i in 1..=k {
            term *= n - i + 1;
            term /= i;
            total += &term;
        }

        Ok(Self { total, last: term })
    }

    pub fn total(&self) -> &BigUint {
        &self.total
    }

    pub fn last(&self) -> &BigUint {
        &self.last
    }
}

/// Packs `(n, k)` into a single cache key. Unique over the full `u32 × u32` range.
pub fn pack_key(n: u32, k: u32) -> u64 {
    (u64::from(n) << 32) | u64::from(k)
}

/// Insertion-only memo of [`NeighborEntry`] values keyed by `(n, k)`.
///
/// The value for a given shape never changes, so entries are kept for the
/// lifetime of the cache. Lookups take a shared read lock; a miss computes the
/// entry outside any lock and publishes it with insert-if-absent, so racing
/// callers for the same key all end up holding the one stored `Arc`.
#[derive(Debug, Default)]
pub struct NeighborCache {
    entries: RwLock<HashMap<u64, Arc<NeighborEntry>>>,
}

impl NeighborCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide cache backing the flat convenience functions.
    pub fn global() -> &'static NeighborCache {
        static GLOBAL: OnceLock<NeighborCache> = OnceLock::new();
        GLOBAL.get_or_init(NeighborCache::new)
    }

    /// Returns the entry for `(n, k)`, building and storing it on first request.
    pub fn get_or_compute(&self, n: u32, k: u32) -> Result<Arc<NeighborEntry>, NeighborError> {
        let key = pack_key(n, k);
        if let Some(entry) = self.entries.read().get(&key) {
            trace!(n, k, "neighbor cache hit");
            return Ok(Arc::clone(entry));
        }

        let computed = NeighborEntry::compute(n, k)?;
        debug!(n, k, total_bits = computed.total.bits(), "neighbor cache miss");

        let mut entries = self.entries.write();
        let stored = entries.entry(key).or_insert_with(|| Arc::new(computed));
        Ok(Arc::clone(stored))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
