//! Hypergeometric-style success estimate for a fuzzing campaign.
//!
//! With a population of `num` items, a per-item failure probability `p` and a
//! required subset size `m`, the estimate is
//!
//! ```text
//! Γ(n' + 1) · Γ(num - m + 1) / ( Γ(num + 1) · Γ(n' - m + 1) ),   n' = (1 - p) · num
//! ```
//!
//! For integer `m` this ratio collapses to `Π_{j<m} (n' - j) / (num - j)`. Up to the
//! product limit the product is formed exactly on big integers and rounded once.
//! Larger `m` sum `ln(1 + (n' - num) / (num - j))` in `f64` alongside a bound on the
//! accumulated error, and directed modes round the bound's far end.

use crate::arith::{RoundingMode, narrow_to_f32, ratio_to_f64};
use num_bigint::BigUint;
use num_traits::One;
use thiserror::Error;
use tracing::warn;

/// Largest `m` evaluated with the exact falling-factorial product by default.
pub const DEFAULT_PRODUCT_LIMIT: u32 = 4096;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbabilityError {
    #[error("Failure probability {0} is outside [0, 1]")]
    InvalidProbability(f32),
    #[error("Count `{name}` must be non-negative, got {value}")]
    NegativeCount { name: &'static str, value: i32 },
    #[error("Required subset {m} exceeds population {num}")]
    SubsetExceedsPopulation { m: i32, num: i32 },
}

/// Pure estimator parameterized by its rounding mode and evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessEstimator {
    rounding: RoundingMode,
    product_limit: u32,
}

impl SuccessEstimator {
    pub fn new(rounding: RoundingMode, product_limit: u32) -> Self {
        Self {
            rounding,
            product_limit,
        }
    }

    /// Estimates the probability of success.
    ///
    /// Returns `Ok(0.0)` when fewer than `m` items survive (`n' < m`): the draw
    /// cannot be satisfied and `Γ(n' - m + 1)` would leave the positive reals.
    pub fn estimate(&self, p: f32, m: i32, num: i32) -> Result<f32, ProbabilityError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ProbabilityError::InvalidProbability(p));
        }
        if m < 0 {
            return Err(ProbabilityError::NegativeCount { name: "m", value: m });
        }
        if num < 0 {
            return Err(ProbabilityError::NegativeCount {
                name: "num",
                value: num,
            });
        }
        if m > num {
            return Err(ProbabilityError::SubsetExceedsPopulation { m, num });
        }
        if m == 0 || p == 0.0 {
            return Ok(1.0);
        }

        let (m, num) = (m.unsigned_abs(), num.unsigned_abs());
        let (mantissa, scale) = dyadic_parts(p);
        // n' · 2^scale, exactly
        let survivors = BigUint::from(num) * ((BigUint::one() << scale) - mantissa);
        if survivors < BigUint::from(m) << scale {
            let survivors = (1.0 - f64::from(p)) * f64::from(num);
            warn!(p, m, num, survivors, "fewer survivors than required draws");
            return Ok(0.0);
        }

        if m <= self.product_limit {
            let value = falling_ratio(&survivors, scale, m, num, self.rounding);
            Ok(narrow_to_f32(value, self.rounding))
        } else {
            Ok(self.log_falling_ratio(p, m, num))
        }
    }

    fn log_falling_ratio(&self, p: f32, m: u32, num: u32) -> f32 {
        let population = f64::from(num);
        let lost = f64::from(p) * population;
        let mut sum = 0.0f64;
        let mut slack = 0.0f64;
        for j in 0..m {
            let x = -lost / (population - f64::from(j));
            let term = x.ln_1p();
            sum += term;
            // argument, ln_1p and summation rounding, in units of epsilon
            slack += -x / (1.0 + x) + 2.0 * term.abs() + sum.abs();
        }
        let slack = 2.0 * f64::EPSILON * slack;
        let exp_slack = 2.0 * f64::EPSILON;

        match self.rounding {
            RoundingMode::Down | RoundingMode::TowardZero => {
                let low = (sum - slack).exp() * (1.0 - exp_slack);
                narrow_to_f32(low.clamp(0.0, 1.0), RoundingMode::Down)
            }
            RoundingMode::Up => {
                // the product is strictly positive here
                let high = (sum + slack).exp() * (1.0 + exp_slack);
                narrow_to_f32(high.clamp(f64::from_bits(1), 1.0), RoundingMode::Up)
            }
            RoundingMode::Nearest => narrow_to_f32(sum.exp().clamp(0.0, 1.0), RoundingMode::Nearest),
        }
    }
}

impl Default for SuccessEstimator {
    fn default() -> Self {
        Self::new(RoundingMode::default(), DEFAULT_PRODUCT_LIMIT)
    }
}

/// Splits `p ∈ [0, 1]` into `mantissa / 2^scale`.
fn dyadic_parts(p: f32) -> (u32, u32) {
    let bits = p.to_bits();
    let exponent = (bits >> 23) & 0xff;
    let fraction = bits & 0x7f_ffff;
    if exponent == 0 {
        (fraction, 149)
    } else {
        (fraction | 1 << 23, 150 - exponent)
    }
}

/// `Π_{j<m} (n' - j) / (num - j)` with `n' = survivors / 2^scale`, rounded once.
fn falling_ratio(survivors: &BigUint, scale: u32, m: u32, num: u32, mode: RoundingMode) -> f64 {
    let unit = BigUint::one() << scale;
    let numerators: Vec<BigUint> = (0..m).map(|j| survivors - &unit * j).collect();
    let denominators: Vec<BigUint> = (0..m).map(|j| BigUint::from(num - j)).collect();
    let numerator = product(&numerators);
    let denominator = product(&denominators) << (u64::from(scale) * u64::from(m));
    ratio_to_f64(&numerator, &denominator, mode)
}

/// Balanced product tree, so the big multiplications pair operands of similar size.
fn product(factors: &[BigUint]) -> BigUint {
    match factors {
        [] => BigUint::one(),
        [single] => single.clone(),
        _ => {
            let (left, right) = factors.split_at(factors.len() / 2);
            product(left) * product(right)
        }
    }
}

/// Estimate with the default estimator (round toward negative infinity).
pub fn estimate_success_probability(p: f32, m: i32, num: i32) -> Result<f32, ProbabilityError> {
    SuccessEstimator::default().estimate(p, m, num)
}
