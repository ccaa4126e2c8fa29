use crate::arith::RoundingMode;
use crate::neighbor::NeighborCache;
use crate::ranking::{PartitionRanker, RankingError};
use rand::Rng;
use rand::seq::index;

/// Default radius of the Hamming ball explored by [`HammingBallMutator`].
pub const DEFAULT_MAX_DISTANCE: u32 = 4;

/// A `Mutator` turns an input buffer into a new, potentially modified buffer.
///
/// # Type Parameters
/// * `R`: The random number generator driving mutation decisions. Any `rand::Rng`
///   works, including [`crate::random::RandomState`].
pub trait Mutator<R: Rng + ?Sized> {
    /// Produces a mutated copy of `input_opt`.
    ///
    /// # Arguments
    /// * `input_opt`: The bytes to mutate. `None` starts from a single zero byte.
    /// * `rng`: The random number generator.
    ///
    /// # Returns
    /// The mutated bytes, or an error if the input cannot be handled.
    fn mutate(&mut self, input_opt: Option<&[u8]>, rng: &mut R) -> Result<Vec<u8>, anyhow::Error>;
}

/// Samples uniformly from the Hamming ball of radius `max_distance` around the input.
///
/// The input is treated as an `n`-bit vector. A flip count `d ≤ k` is drawn with
/// weight `C(n, d) / Σ_{i<=k} C(n, i)` (the partition ratios), then `d` distinct
/// bit positions are flipped, chosen uniformly. Together the two steps give every
/// vector within distance `k` the same probability, the original input included.
///
/// The radius is clamped to the input's bit length.
#[derive(Debug)]
pub struct HammingBallMutator<'c> {
    ranker: PartitionRanker<'c>,
    max_distance: u32,
    /// Weights for the most recent `(n, k)` shape.
    weights: Option<(u32, u32, Vec<f64>)>,
}

impl<'c> HammingBallMutator<'c> {
    pub fn new(cache: &'c NeighborCache, rounding: RoundingMode, max_distance: u32) -> Self {
        Self {
            ranker: PartitionRanker::new(cache, rounding),
            max_distance,
            weights: None,
        }
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Draws a flip count in `0..=k` for an `n`-bit input, weighted by the partition ratios.
    pub fn sample_distance<R: Rng + ?Sized>(
        &mut self,
        n: u32,
        k: u32,
        rng: &mut R,
    ) -> Result<u32, RankingError> {
        let weights = self.weights_for(n, k)?;
        let draw: f64 = rng.random();
        let mut cumulative = 0.0;
        for (d, w) in weights.iter().enumerate() {
            cumulative += w;
            if draw < cumulative {
                return Ok(d as u32);
            }
        }
        // rounding left the weights a hair short of one
        Ok(k)
    }

    fn weights_for(&mut self, n: u32, k: u32) -> Result<&[f64], RankingError> {
        let stale = !matches!(&self.weights, Some((wn, wk, _)) if *wn == n && *wk == k);
        if stale {
            let weights = self.ranker.distance_weights(n, k)?;
            self.weights = Some((n, k, weights));
        }
        Ok(self.weights.as_ref().map_or(&[][..], |(_, _, w)| w.as_slice()))
    }
}

impl<R: Rng + ?Sized> Mutator<R> for HammingBallMutator<'_> {
    fn mutate(&mut self, input_opt: Option<&[u8]>, rng: &mut R) -> Result<Vec<u8>, anyhow::Error> {
        let mut bytes = match input_opt {
            Some(input) => input.to_vec(),
            None => vec![0u8; 1],
        };

        let bit_len = bytes
            .len()
            .checked_mul(8)
            .and_then(|bits| u32::try_from(bits).ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Input of {} bytes exceeds the addressable bit range",
                    bytes.len()
                )
            })?;
        let k = self.max_distance.min(bit_len);

        let distance = self.sample_distance(bit_len, k, rng)?;
        for bit in index::sample(rng, bit_len as usize, distance as usize) {
            bytes[bit / 8] ^= 1 << (bit % 8);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomState;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    #[test]
    fn mutation_stays_inside_the_ball() {
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Down, 3);
        let mut rng = ChaCha8Rng::from_seed([0u8; 32]);
        let input: Vec<u8> = vec![10, 20, 30, 40];

        for _ in 0..500 {
            let mutated = mutator.mutate(Some(input.as_slice()), &mut rng).unwrap();
            assert_eq!(mutated.len(), input.len());
            assert!(hamming_distance(&input, &mutated) <= 3);
        }
    }

    #[test]
    fn zero_radius_returns_the_input() {
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Down, 0);
        let mut rng = ChaCha8Rng::from_seed([1u8; 32]);
        let input: Vec<u8> = vec![0xAA, 0x55];
        assert_eq!(mutator.mutate(Some(input.as_slice()), &mut rng).unwrap(), input);
    }

    #[test]
    fn empty_and_none_inputs() {
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Down, 4);
        let mut rng = ChaCha8Rng::from_seed([2u8; 32]);

        let from_empty = mutator.mutate(Some(&[][..]), &mut rng).unwrap();
        assert!(from_empty.is_empty());

        let from_none = mutator.mutate(None, &mut rng).unwrap();
        assert_eq!(from_none.len(), 1);
        assert!(from_none[0].count_ones() <= 4);
    }

    #[test]
    fn full_radius_is_uniform_over_the_cube() {
        // radius 8 over one byte covers all 256 values; distance d should turn up
        // with frequency C(8, d) / 256
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Nearest, 8);
        let mut rng = ChaCha8Rng::from_seed([3u8; 32]);
        let samples = 20_000;
        let mut counts = [0usize; 9];
        for _ in 0..samples {
            let mutated = mutator.mutate(Some(&[0u8][..]), &mut rng).unwrap();
            counts[mutated[0].count_ones() as usize] += 1;
        }

        let binomials = [1.0, 8.0, 28.0, 56.0, 70.0, 56.0, 28.0, 8.0, 1.0];
        for (d, expected) in binomials.iter().enumerate() {
            let observed = counts[d] as f64 / samples as f64;
            assert!(
                (observed - expected / 256.0).abs() < 0.02,
                "distance {d}: observed {observed}"
            );
        }
    }

    #[test]
    fn sample_distance_reuses_weights_for_the_same_shape() {
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Down, 4);
        let mut rng = ChaCha8Rng::from_seed([4u8; 32]);
        for _ in 0..50 {
            assert!(mutator.sample_distance(64, 4, &mut rng).unwrap() <= 4);
        }
        assert_eq!(cache.len(), 1);
        assert!(mutator.sample_distance(8, 9, &mut rng).is_err());
    }

    #[test]
    fn equally_seeded_random_states_drive_identical_mutations() {
        let cache = NeighborCache::new();
        let mut mutator = HammingBallMutator::new(&cache, RoundingMode::Down, 6);
        let input = b"seed input".to_vec();

        let mut run = |seed: u64| {
            let mut state = RandomState::new();
            state.seed(seed);
            let out: Vec<Vec<u8>> = (0..20)
                .map(|_| mutator.mutate(Some(input.as_slice()), &mut state).unwrap())
                .collect();
            state.dispose();
            out
        };

        assert_eq!(run(99), run(99));
    }
}
