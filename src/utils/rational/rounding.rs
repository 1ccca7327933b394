use std::cmp::Ordering;

use malachite::num::arithmetic::traits::{Abs, FloorLogBase2};
use malachite::num::arithmetic::traits::{RoundToMultipleOfPowerOf2, Sign};
use malachite::rounding_modes::RoundingMode;
use malachite::Rational;

/// Rounding to a multiple of `2^position`.
pub trait RoundBinary: Sized {
    type Output;

    fn round(self, position: i64, mode: RoundingMode) -> Self::Output;

    #[inline]
    fn round_nearest(self, position: i64) -> Self::Output {
        self.round(position, RoundingMode::Nearest)
    }
}

impl<T> RoundBinary for T
where
    T: RoundToMultipleOfPowerOf2<i64>,
{
    type Output = T::Output;

    fn round(self, position: i64, mode: RoundingMode) -> Self::Output {
        self.round_to_multiple_of_power_of_2(position, mode).0
    }
}

/// Rounds `value` to the nearest rational with at most `bits` significant
/// binary digits.
///
/// This is the arithmetic of the arbitrary-precision float mode: every
/// intermediate result is passed through it.
pub fn round_significant(value: Rational, bits: u32) -> Rational {
    if value.sign() == Ordering::Equal {
        return value;
    }

    let exponent = (&value).abs().floor_log_base_2();

    value.round_nearest(exponent + 1 - i64::from(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significant_rounding() {
        let third = Rational::from_signeds(1, 3);

        // 1/3 = 0.010101...b; four significant bits give 0.01011b = 11/32.
        assert_eq!(
            round_significant(third.clone(), 4),
            Rational::from_signeds(11, 32)
        );
        assert_eq!(
            round_significant(-third, 4),
            Rational::from_signeds(-11, 32)
        );
        assert_eq!(
            round_significant(Rational::from(12), 2),
            Rational::from(12)
        );
        assert_eq!(
            round_significant(Rational::from(0), 8),
            Rational::from(0)
        );
    }

    #[test]
    fn nearest_multiple() {
        let five_quarters = Rational::from_signeds(5, 4);

        assert_eq!(five_quarters.clone().round_nearest(0), Rational::from(1));
        assert_eq!(
            five_quarters.round(-1, RoundingMode::Ceiling),
            Rational::from_signeds(3, 2)
        );
    }
}
