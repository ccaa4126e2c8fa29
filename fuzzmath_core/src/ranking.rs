use crate::arith::{RoundingMode, ratio_to_f64};
use crate::neighbor::{NeighborCache, NeighborEntry, NeighborError};
use num_bigint::BigUint;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by partition ranking queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankingError {
    /// The rank asked for lies past the radius of the ball.
    #[error("Position {pos} exceeds maximum distance {k}")]
    PositionOutOfRange { pos: u32, k: u32 },
    /// The underlying `(n, k)` shape could not be built.
    #[error(transparent)]
    Neighbor(#[from] NeighborError),
}

/// Walks a partition value backward from distance `k` to distance `pos`.
///
/// Each step applies `value * k / (n - k + 1)` and decrements `k`, which turns
/// `C(n, k)` into `C(n, k - 1)` exactly. Starting from `C(n, k)` the walk ends at
/// `C(n, pos)`.
fn walk_back(n: u32, mut k: u32, pos: u32, value: &mut BigUint) {
    while k > pos {
        *value *= k;
        *value /= n - k + 1;
        k -= 1;
    }
}

/// Maps ranks within a Hamming ball to normalized ratios.
///
/// The ratio for rank `pos` in the ball `(n, k)` is `C(n, pos) / Σ_{i<=k} C(n, i)`:
/// the share of all neighbors that sit at exactly distance `pos`. Callers use it
/// to weight how many positions to mutate.
///
/// A ranker borrows its [`NeighborCache`] so several rankers (or a mutator) can
/// share memoized shapes. It never mutates cached entries.
#[derive(Debug, Clone, Copy)]
pub struct PartitionRanker<'c> {
    cache: &'c NeighborCache,
    rounding: RoundingMode,
}

impl<'c> PartitionRanker<'c> {
    pub fn new(cache: &'c NeighborCache, rounding: RoundingMode) -> Self {
        Self { cache, rounding }
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// Exact partition value `C(n, pos)`, recovered by walking back from the cached `C(n, k)`.
    pub fn partition_at(&self, n: u32, k: u32, pos: u32) -> Result<BigUint, RankingError> {
        let (_, partition) = self.partition_with_entry(n, k, pos)?;
        Ok(partition)
    }

    /// Ratio of the partition at `pos` to the ball's total, rounded once into an `f64`.
    pub fn ratio_at_position(&self, n: u32, k: u32, pos: u32) -> Result<f64, RankingError> {
        let (entry, partition) = self.partition_with_entry(n, k, pos)?;
        Ok(ratio_to_f64(&partition, entry.total(), self.rounding))
    }

    fn partition_with_entry(
        &self,
        n: u32,
        k: u32,
        pos: u32,
    ) -> Result<(Arc<NeighborEntry>, BigUint), RankingError> {
        if pos > k {
            return Err(RankingError::PositionOutOfRange { pos, k });
        }
        let entry = self.cache.get_or_compute(n, k)?;
        // copy: the cached term is shared
        let mut partition = entry.last().clone();
        walk_back(n, k, pos, &mut partition);
        Ok((entry, partition))
    }

    /// Ratios for every position `0..=k` from a single backward walk.
    ///
    /// `weights[d]` equals `ratio_at_position(n, k, d)`; the weights sum to one
    /// up to rounding.
    pub fn distance_weights(&self, n: u32, k: u32) -> Result<Vec<f64>, RankingError> {
        let entry = self.cache.get_or_compute(n, k)?;
        let mut weights = vec![0.0; k as usize + 1];
        let mut partition = entry.last().clone();
        let mut d = k;
        loop {
            weights[d as usize] = ratio_to_f64(&partition, entry.total(), self.rounding);
            if d == 0 {
                break;
            }
            walk_back(n, d, d - 1, &mut partition);
            d -= 1;
        }
        Ok(weights)
    }
}

/// `ratio_at_position` against the process-wide cache, rounding down.
///
/// The top rank `pos == k` yields `last / total`, which is `1.0` only for `k == 0`.
pub fn neighbor_ratio(n: u32, k: u32, pos: u32) -> Result<f64, RankingError> {
    PartitionRanker::new(NeighborCache::global(), RoundingMode::default())
        .ratio_at_position(n, k, pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_for_five_bits_radius_two() {
        assert_eq!(neighbor_ratio(5, 2, 2).unwrap(), 0.625);
        assert_eq!(neighbor_ratio(5, 2, 1).unwrap(), 5.0 / 16.0);
        assert_eq!(neighbor_ratio(5, 2, 0).unwrap(), 1.0 / 16.0);
    }

    #[test]
    fn flat_top_rank_is_last_over_total() {
        assert_eq!(neighbor_ratio(9, 0, 0).unwrap(), 1.0);
        assert_eq!(neighbor_ratio(3, 1, 1).unwrap(), 0.75);
        assert!(neighbor_ratio(64, 3, 3).unwrap() < 1.0);
    }

    #[test]
    fn subnormal_ratios_follow_the_rounding_mode() {
        // 1 / 2^1100 lies below the smallest subnormal
        let cache = NeighborCache::new();
        let down = PartitionRanker::new(&cache, RoundingMode::Down);
        let up = PartitionRanker::new(&cache, RoundingMode::Up);
        assert_eq!(down.ratio_at_position(1100, 1100, 0).unwrap(), 0.0);
        assert_eq!(up.ratio_at_position(1100, 1100, 0).unwrap(), f64::from_bits(1));
    }

    #[test]
    fn top_rank_keeps_the_cached_last_term() {
        let cache = NeighborCache::new();
        let ranker = PartitionRanker::new(&cache, RoundingMode::Nearest);
        for (n, k) in [(0, 0), (1, 1), (8, 3), (33, 17), (200, 9)] {
            let entry = cache.get_or_compute(n, k).unwrap();
            assert_eq!(&ranker.partition_at(n, k, k).unwrap(), entry.last());
            let expected = ratio_to_f64(entry.last(), entry.total(), RoundingMode::Nearest);
            assert_eq!(ranker.ratio_at_position(n, k, k).unwrap(), expected);
        }
        assert_eq!(ranker.ratio_at_position(17, 0, 0).unwrap(), 1.0);
    }

    #[test]
    fn backward_walk_agrees_with_forward_recurrence() {
        let cache = NeighborCache::new();
        let ranker = PartitionRanker::new(&cache, RoundingMode::Down);
        for (n, k, pos) in [(10, 4, 2), (10, 4, 0), (64, 10, 7), (128, 64, 1), (31, 31, 15)] {
            let backward = ranker.partition_at(n, k, pos).unwrap();
            let forward = NeighborEntry::compute(n, pos).unwrap();
            assert_eq!(&backward, forward.last(), "({n}, {k}, {pos})");
        }
        assert_eq!(ranker.partition_at(10, 4, 2).unwrap(), BigUint::from(45u32));
    }

    #[test]
    fn ranking_leaves_the_cached_entry_untouched() {
        let cache = NeighborCache::new();
        let ranker = PartitionRanker::new(&cache, RoundingMode::Down);
        let before = cache.get_or_compute(20, 6).unwrap().as_ref().clone();
        ranker.ratio_at_position(20, 6, 0).unwrap();
        ranker.distance_weights(20, 6).unwrap();
        let after = cache.get_or_compute(20, 6).unwrap();
        assert_eq!(&before, after.as_ref());
    }

    #[test]
    fn out_of_range_positions_are_rejected() {
        let cache = NeighborCache::new();
        let ranker = PartitionRanker::new(&cache, RoundingMode::Down);
        assert_eq!(
            ranker.ratio_at_position(10, 3, 4),
            Err(RankingError::PositionOutOfRange { pos: 4, k: 3 })
        );
        assert_eq!(
            ranker.ratio_at_position(3, 4, 1),
            Err(RankingError::Neighbor(NeighborError::DistanceExceedsLength { n: 3, k: 4 }))
        );
    }

    #[test]
    fn distance_weights_match_single_queries() {
        let cache = NeighborCache::new();
        let ranker = PartitionRanker::new(&cache, RoundingMode::Nearest);
        let weights = ranker.distance_weights(24, 6).unwrap();
        assert_eq!(weights.len(), 7);
        for (d, w) in weights.iter().enumerate() {
            assert_eq!(*w, ranker.ratio_at_position(24, 6, d as u32).unwrap());
        }
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
