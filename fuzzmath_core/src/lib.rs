pub mod arith;
pub mod config;
pub mod mutator;
pub mod neighbor;
pub mod probability;
pub mod random;
pub mod ranking;

pub use arith::RoundingMode;
pub use config::FuzzMathConfig;
pub use mutator::{HammingBallMutator, Mutator};
pub use neighbor::{NeighborCache, NeighborEntry, NeighborError};
pub use probability::{ProbabilityError, SuccessEstimator, estimate_success_probability};
pub use random::{RandomState, create_random_state, dispose_random_state, seed_random_state};
pub use ranking::{PartitionRanker, RankingError, neighbor_ratio};
