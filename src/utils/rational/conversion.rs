//! Conversions between machine floats and exact numbers.

use malachite::num::conversion::traits::RoundingFrom;
use malachite::rounding_modes::RoundingMode;
use malachite::{Integer, Rational};

use super::RoundBinary;

/// Converts a finite float to the rational it represents exactly.
pub fn exact_rational(value: f64) -> Option<Rational> {
    Rational::try_from(value).ok()
}

/// Rounds a rational to the nearest float.
pub fn to_f64(value: &Rational) -> f64 {
    f64::rounding_from(value, RoundingMode::Nearest).0
}

/// Quantizes a finite float to the nearest multiple of 2^-`bits`, returning
/// the multiple as an integer (that is, scaled by 2^`bits`).
pub fn quantize(value: f64, bits: u32) -> Option<Integer> {
    let position = -i64::from(bits);
    let rounded = exact_rational(value)?.round_nearest(position);

    Integer::try_from(rounded << u64::from(bits)).ok()
}
