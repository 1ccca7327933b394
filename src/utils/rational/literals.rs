//! Exact literals in solver output.

use malachite::num::basic::traits::Zero;
use malachite::num::conversion::traits::FromStringBase;
use malachite::{Natural, Rational};

/// Parses a signed decimal integer or ratio such as `-12` or `+3/4`.
pub fn parse_exact(literal: &str) -> Option<Rational> {
    let (sign, magnitude) = match literal.as_bytes().first()? {
        b'-' => (false, &literal[1..]),
        b'+' => (true, &literal[1..]),
        _ => (true, literal),
    };

    let (numerator, denominator) =
        magnitude.split_once('/').unwrap_or((magnitude, "1"));

    if numerator.is_empty() || denominator.is_empty() {
        return None;
    }

    let numerator = Natural::from_string_base(10, numerator)?;
    let denominator = Natural::from_string_base(10, denominator)?;

    if denominator == Natural::ZERO {
        return None;
    }

    Some(Rational::from_sign_and_naturals(sign, numerator, denominator))
}
