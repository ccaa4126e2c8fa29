//! Arithmetic adapter over `num-bigint`.
//!
//! Everything numeric in this crate bottoms out here: exact big-integer ratios
//! are rounded once into an `f64` under an explicit [`RoundingMode`] (subnormal
//! results included), and the continuous factorial is evaluated through a Lanczos
//! log-gamma so that large arguments never overflow a fixed-width float.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;
use serde::Deserialize;
use std::f64::consts::PI;

/// Width of an IEEE-754 binary64 significand, hidden bit included.
const F64_SIGNIFICAND_BITS: u64 = 53;

/// `-log2` of the smallest positive subnormal `f64`.
const F64_SUBNORMAL_UNIT_EXP: i64 = 1074;

/// Largest power-of-two step applied in one multiply when rescaling a float.
/// `2^±1000` is still a normal `f64`, so each step is exact.
const MAX_SCALE_STEP: i64 = 1000;

/// Lanczos parameter `g` matching [`LANCZOS_COEFFICIENTS`].
const LANCZOS_G: f64 = 7.0;

/// Lanczos series coefficients for `g = 7`, `n = 9`.
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Rounding applied whenever an exact or wider value is narrowed into a machine float.
///
/// The mode is threaded through every conversion so that results stay reproducible
/// regardless of the platform's default floating-point environment.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Round toward negative infinity.
    #[default]
    Down,
    /// Round toward positive infinity.
    Up,
    /// Round to nearest, ties to even.
    Nearest,
    /// Truncate toward zero.
    TowardZero,
}

/// Converts the exact ratio `num / den` into an `f64`, rounding once under `mode`.
///
/// The quotient is computed on big integers with one guard bit past the
/// significand plus a sticky remainder, so the only inexact step is the final
/// rounding. A zero denominator follows IEEE division (`NaN` for `0/0`,
/// `+inf` otherwise).
pub fn ratio_to_f64(num: &BigUint, den: &BigUint, mode: RoundingMode) -> f64 {
    if den.is_zero() {
        return if num.is_zero() { f64::NAN } else { f64::INFINITY };
    }
    if num.is_zero() {
        return 0.0;
    }

    // Scale so the quotient lands in [2^53, 2^55): 54 or 55 significant bits.
    let shift = (F64_SIGNIFICAND_BITS + 1) as i64 + den.bits() as i64 - num.bits() as i64;
    let (quotient, remainder) = if shift >= 0 {
        (num << shift as u64).div_rem(den)
    } else {
        num.div_rem(&(den << shift.unsigned_abs()))
    };

    // Bits below the result's last place. Subnormal results keep fewer than 53.
    let excess = quotient.bits() - F64_SIGNIFICAND_BITS;
    let dropped = (excess as i64).max(shift - F64_SUBNORMAL_UNIT_EXP) as u64;
    // quotient < 2^55, so it is a single u64 digit
    let raw = quotient.iter_u64_digits().next().unwrap_or(0);
    let sticky = !remainder.is_zero();

    let (mut significand, round_up) = if dropped >= u64::BITS as u64 {
        // everything sits below half an ulp of the smallest subnormal
        (0, mode == RoundingMode::Up)
    } else {
        let guard = raw & ((1u64 << dropped) - 1);
        let half = 1u64 << (dropped - 1);
        let significand = raw >> dropped;
        let round_up = match mode {
            RoundingMode::Down | RoundingMode::TowardZero => false,
            RoundingMode::Up => guard != 0 || sticky,
            RoundingMode::Nearest => {
                guard > half || (guard == half && (sticky || significand & 1 == 1))
            }
        };
        (significand, round_up)
    };
    if round_up {
        significand += 1;
    }

    scale_by_power_of_two(significand as f64, dropped as i64 - shift)
}

/// Multiplies `value` by `2^exponent` without intermediate under/overflow of the scale factor.
fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    while exponent > MAX_SCALE_STEP {
        value *= 2f64.powi(MAX_SCALE_STEP as i32);
        exponent -= MAX_SCALE_STEP;
        if value.is_infinite() {
            return value;
        }
    }
    while exponent < -MAX_SCALE_STEP {
        value *= 2f64.powi(-MAX_SCALE_STEP as i32);
        exponent += MAX_SCALE_STEP;
        if value == 0.0 {
            return value;
        }
    }
    value * 2f64.powi(exponent as i32)
}

/// Narrows an `f64` into an `f32` under `mode`.
pub fn narrow_to_f32(value: f64, mode: RoundingMode) -> f32 {
    let nearest = value as f32;
    if value.is_nan() || f64::from(nearest) == value {
        return nearest;
    }
    let overshot = f64::from(nearest) > value;
    match mode {
        RoundingMode::Nearest => nearest,
        RoundingMode::Down => {
            if overshot {
                next_down_f32(nearest)
            } else {
                nearest
            }
        }
        RoundingMode::Up => {
            if overshot {
                nearest
            } else {
                next_up_f32(nearest)
            }
        }
        RoundingMode::TowardZero => {
            if value > 0.0 {
                narrow_to_f32(value, RoundingMode::Down)
            } else {
                narrow_to_f32(value, RoundingMode::Up)
            }
        }
    }
}

fn next_up_f32(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    f32::from_bits(if x > 0.0 { bits + 1 } else { bits - 1 })
}

fn next_down_f32(x: f32) -> f32 {
    -next_up_f32(-x)
}

/// Natural logarithm of `Γ(x)` for `x > 0`.
///
/// Uses the Lanczos approximation, with the reflection formula below `0.5`.
/// Returns `NaN` outside the positive reals.
pub fn ln_gamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64));

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Continuous factorial in log space: `ln(x!) = ln Γ(x + 1)`.
pub fn ln_factorial(x: f64) -> f64 {
    ln_gamma(x + 1.0)
}
