//! Sparse multivariate polynomials with exact coefficients.

mod system;

use std::collections::BTreeMap;
use std::fmt;

use malachite::num::arithmetic::traits::{Abs, Pow};
use malachite::num::basic::traits::{One, Zero};
use malachite::Rational;
use nalgebra::Complex;
use smallvec::SmallVec;

pub use system::{PolynomialSystem, Structure};

use crate::utils::rational::to_f64;

pub type Exponents = SmallVec<[u32; 4]>;

/// A polynomial in `nvars` variables, stored as a map from exponent vectors
/// to nonzero coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial {
    nvars: usize,
    terms: BTreeMap<Exponents, Rational>,
}

impl Polynomial {
    pub fn zero(nvars: usize) -> Polynomial {
        Polynomial {
            nvars,
            terms: BTreeMap::new(),
        }
    }

    pub fn constant(nvars: usize, value: Rational) -> Polynomial {
        let mut polynomial = Polynomial::zero(nvars);

        polynomial.add_term(&vec![0; nvars], value);
        polynomial
    }

    /// The polynomial `x_index`.
    pub fn variable(nvars: usize, index: usize) -> Polynomial {
        let mut exponents = vec![0; nvars];
        exponents[index] = 1;

        let mut polynomial = Polynomial::zero(nvars);

        polynomial.add_term(&exponents, Rational::ONE);
        polynomial
    }

    pub fn from_terms<I, E>(nvars: usize, terms: I) -> Polynomial
    where
        I: IntoIterator<Item = (E, Rational)>,
        E: AsRef<[u32]>,
    {
        let mut polynomial = Polynomial::zero(nvars);

        for (exponents, coefficient) in terms {
            polynomial.add_term(exponents.as_ref(), coefficient);
        }

        polynomial
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&[u32], &Rational)> + '_ {
        self.terms.iter().map(|(e, c)| (e.as_slice(), c))
    }

    /// Adds `coefficient * x^exponents`, dropping the term if it cancels.
    pub fn add_term(&mut self, exponents: &[u32], coefficient: Rational) {
        debug_assert_eq!(exponents.len(), self.nvars);

        if coefficient == Rational::ZERO {
            return;
        }

        let key = Exponents::from_slice(exponents);
        let sum = match self.terms.remove(&key) {
            Some(existing) => existing + coefficient,
            None => coefficient,
        };

        if sum != Rational::ZERO {
            self.terms.insert(key, sum);
        }
    }

    /// Total degree. The zero polynomial has degree zero.
    pub fn degree(&self) -> u32 {
        self.terms
            .keys()
            .map(|e| e.iter().sum())
            .max()
            .unwrap_or(0)
    }

    pub fn degree_in(&self, var: usize) -> u32 {
        self.terms.keys().map(|e| e[var]).max().unwrap_or(0)
    }

    pub fn depends_on(&self, var: usize) -> bool {
        self.terms.keys().any(|e| e[var] > 0)
    }

    /// Whether the polynomial is a nonzero constant.
    pub fn is_nonzero_constant(&self) -> bool {
        self.terms.len() == 1 && self.degree() == 0
    }

    /// Largest coefficient magnitude, rounded to a float.
    pub fn max_coefficient(&self) -> f64 {
        self.terms
            .values()
            .map(|c| to_f64(&c.abs()))
            .fold(0.0, f64::max)
    }

    pub fn scale(&self, factor: &Rational) -> Polynomial {
        Polynomial::from_terms(
            self.nvars,
            self.terms.iter().map(|(e, c)| (e.clone(), c * factor)),
        )
    }

    pub fn derivative(&self, var: usize) -> Polynomial {
        let terms = self
            .terms
            .iter()
            .filter(|(e, _)| e[var] > 0)
            .map(|(e, c)| {
                let mut exponents = e.clone();
                let power = exponents[var];

                exponents[var] -= 1;

                (exponents, c * Rational::from(power))
            });

        Polynomial::from_terms(self.nvars, terms)
    }

    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(e, c)| {
                e.iter()
                    .zip(x)
                    .fold(to_f64(c), |acc, (&k, &xi)| acc * xi.powi(k as i32))
            })
            .sum()
    }

    pub fn eval_complex(&self, z: &[Complex<f64>]) -> Complex<f64> {
        self.terms
            .iter()
            .map(|(e, c)| {
                e.iter()
                    .zip(z)
                    .fold(Complex::new(to_f64(c), 0.0), |acc, (&k, zi)| {
                        acc * zi.powu(k)
                    })
            })
            .sum()
    }

    pub fn eval_exact(&self, x: &[Rational]) -> Rational {
        self.terms
            .iter()
            .map(|(e, c)| {
                e.iter().zip(x).fold(c.clone(), |acc, (&k, xi)| {
                    acc * xi.clone().pow(u64::from(k))
                })
            })
            .fold(Rational::ZERO, |acc, term| acc + term)
    }
}

impl fmt::Display for Polynomial {
    /// Writes the polynomial as `3/4*x0^2*x1-x1+2`, highest exponents
    /// first.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }

        for (position, (exponents, coefficient)) in
            self.terms.iter().rev().enumerate()
        {
            let negative = *coefficient < Rational::ZERO;
            let magnitude = coefficient.abs();

            if negative {
                write!(f, "-")?;
            } else if position > 0 {
                write!(f, "+")?;
            }

            let monomial: Vec<String> = exponents
                .iter()
                .enumerate()
                .filter(|&(_, &k)| k > 0)
                .map(|(i, &k)| match k {
                    1 => format!("x{i}"),
                    _ => format!("x{i}^{k}"),
                })
                .collect();

            if monomial.is_empty() {
                write!(f, "{magnitude}")?;
            } else if magnitude == Rational::ONE {
                write!(f, "{}", monomial.join("*"))?;
            } else {
                write!(f, "{magnitude}*{}", monomial.join("*"))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::from_signeds(n, d)
    }

    /// 3/4 x0^2 x1 - x1 + 2
    fn sample() -> Polynomial {
        Polynomial::from_terms(
            2,
            [
                ([2u32, 1], q(3, 4)),
                ([0, 1], q(-1, 1)),
                ([0, 0], q(2, 1)),
            ],
        )
    }

    #[test]
    fn display() {
        assert_eq!(sample().to_string(), "3/4*x0^2*x1-x1+2");
        assert_eq!(Polynomial::zero(3).to_string(), "0");
        assert_eq!(Polynomial::constant(1, q(-5, 2)).to_string(), "-5/2");
    }

    #[test]
    fn terms_cancel() {
        let mut p = sample();

        p.add_term(&[0, 1], q(1, 1));

        assert_eq!(p.len(), 2);

        p.add_term(&[2, 1], q(-3, 4));
        p.add_term(&[0, 0], q(-2, 1));

        assert!(p.is_zero());
    }

    #[test]
    fn derivatives() {
        let p = sample();

        // d/dx0 = 3/2 x0 x1
        assert_eq!(
            p.derivative(0),
            Polynomial::from_terms(2, [([1u32, 1], q(3, 2))])
        );
        // d/dx1 = 3/4 x0^2 - 1
        assert_eq!(
            p.derivative(1),
            Polynomial::from_terms(
                2,
                [([2u32, 0], q(3, 4)), ([0, 0], q(-1, 1))]
            )
        );
        assert!(p.derivative(0).derivative(0).derivative(0).is_zero());
    }

    #[test]
    fn evaluation() {
        let p = sample();

        assert_abs_diff_eq!(p.eval(&[2.0, -1.0]), 0.0, epsilon = 1e-15);
        assert_eq!(p.eval_exact(&[q(1, 2), q(4, 1)]), q(-5, 4));

        let z =
            p.eval_complex(&[Complex::new(0.0, 1.0), Complex::new(1.0, 0.0)]);

        // 3/4 * (i^2) * 1 - 1 + 2 = 1/4
        assert_abs_diff_eq!(z.re, 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(z.im, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn degrees() {
        let p = sample();

        assert_eq!(p.degree(), 3);
        assert_eq!(p.degree_in(0), 2);
        assert!(p.depends_on(0));
        assert!(Polynomial::constant(2, q(1, 1)).is_nonzero_constant());
        assert_eq!(p.max_coefficient(), 2.0);
    }
}
