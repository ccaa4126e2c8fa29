use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::fmt;
use tracing::{debug, trace};

/// Key used before any explicit seed is applied.
const DEFAULT_KEY: [u8; 32] = [0u8; 32];

/// An owned pseudo-random generator for mutation-position sampling.
///
/// The state is created with a fixed default key, can be reseeded any number of
/// times, and is released when dropped. [`RandomState::dispose`] consumes the
/// value, so it cannot be used afterwards. The type is `Send` but deliberately
/// not `Clone`: one owner drives one sequence.
///
/// It implements [`RngCore`], so it plugs straight into any `rand::Rng` consumer,
/// such as [`crate::mutator::Mutator`] implementations.
pub struct RandomState {
    rng: ChaCha8Rng,
}

impl RandomState {
    /// Creates a default-initialized generator. No seed has been applied yet,
    /// so every fresh state yields the same sequence.
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_seed(DEFAULT_KEY),
        }
    }

    /// Reseeds from scratch. Calling this twice with the same value restarts the
    /// same sequence; previous draws contribute nothing.
    pub fn seed(&mut self, seed: u64) {
        debug!(seed, "reseeding random state");
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Releases the generator.
    pub fn dispose(self) {}
}

impl Default for RandomState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RandomState {
    fn drop(&mut self) {
        trace!("random state released");
    }
}

impl fmt::Debug for RandomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomState").finish_non_exhaustive()
    }
}

impl RngCore for RandomState {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst)
    }
}

pub fn create_random_state() -> RandomState {
    RandomState::new()
}

pub fn seed_random_state(state: &mut RandomState, seed: u64) {
    state.seed(seed);
}

pub fn dispose_random_state(state: RandomState) {
    state.dispose();
}
