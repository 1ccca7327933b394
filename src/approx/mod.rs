//! Polynomial approximants in orthogonal tensor-product bases.
//!
//! An [`Approximant`] is fit by least squares on a [`SampleGrid`]. The
//! arithmetic of the solve is selected by a [`PrecisionKind`], which is
//! threaded through explicitly rather than inferred from the sample types.

mod quality;
mod solve;

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use malachite::num::basic::traits::Zero;
use malachite::{Integer, Rational};
use nalgebra::{DMatrix, DVector};

pub use quality::ErrorReport;

use crate::basis::{BasisKind, SampleGrid};
use crate::config::ConfigError;
use crate::domain::Domain;
use crate::poly::Polynomial;
use crate::utils::rational::{exact_rational, quantize, to_f64};

/// Arithmetic used to solve for the coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrecisionKind {
    /// SVD least squares in machine floats.
    #[default]
    Float64,
    /// Exact elimination over the rationals.
    Rational,
    /// Elimination over the rationals with every intermediate rounded to
    /// `bits` significant bits.
    ArbitraryFloat { bits: u32 },
    /// Fraction-free elimination on entries quantized to multiples of
    /// 2^-`bits`.
    ArbitraryInteger { bits: u32 },
}

impl PrecisionKind {
    pub const MIN_BITS: u32 = 8;
    pub const MAX_BITS: u32 = 1 << 16;

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            PrecisionKind::ArbitraryFloat { bits }
            | PrecisionKind::ArbitraryInteger { bits } => {
                if bits < Self::MIN_BITS {
                    Err(ConfigError::InvalidPrecision("too few bits"))
                } else if bits > Self::MAX_BITS {
                    Err(ConfigError::InvalidPrecision("too many bits"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Whether coefficients come out as exact rationals.
    pub fn is_exact(&self) -> bool {
        !matches!(self, PrecisionKind::Float64)
    }
}

impl FromStr for PrecisionKind {
    type Err = ConfigError;

    /// Parses `float64`, `rational`, `float:<bits>` or `integer:<bits>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, bits) = match s.split_once(':') {
            Some((name, bits)) => {
                let bits = bits.parse().map_err(|_| {
                    ConfigError::InvalidPrecision("bad bit count")
                })?;

                (name, Some(bits))
            }
            None => (s, None),
        };

        let kind = match (name, bits) {
            ("float64" | "f64", None) => PrecisionKind::Float64,
            ("rational", None) => PrecisionKind::Rational,
            ("float", Some(bits)) => PrecisionKind::ArbitraryFloat { bits },
            ("integer", Some(bits)) => PrecisionKind::ArbitraryInteger { bits },
            _ => {
                return Err(ConfigError::InvalidPrecision("unknown precision"))
            }
        };

        kind.validate()?;

        Ok(kind)
    }
}

impl fmt::Display for PrecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrecisionKind::Float64 => write!(f, "float64"),
            PrecisionKind::Rational => write!(f, "rational"),
            PrecisionKind::ArbitraryFloat { bits } => write!(f, "float:{bits}"),
            PrecisionKind::ArbitraryInteger { bits } => {
                write!(f, "integer:{bits}")
            }
        }
    }
}

/// Expansion coefficients, one per tensor-product basis function.
#[derive(Clone, Debug, PartialEq)]
pub enum Coefficients {
    Float(Vec<f64>),
    Rational(Vec<Rational>),
}

impl Coefficients {
    pub fn len(&self) -> usize {
        match self {
            Coefficients::Float(c) => c.len(),
            Coefficients::Rational(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Coefficients::Float(c) => c.clone(),
            Coefficients::Rational(c) => c.iter().map(to_f64).collect(),
        }
    }

    /// Converts to rationals, exactly. Fails on non-finite floats.
    pub fn to_rational(&self) -> Option<Vec<Rational>> {
        match self {
            Coefficients::Float(c) => {
                c.iter().map(|&x| exact_rational(x)).collect()
            }
            Coefficients::Rational(c) => Some(c.clone()),
        }
    }
}

/// A polynomial fit to sampled values of a function.
///
/// Coefficient `k` multiplies the product of basis polynomials whose degrees
/// are the `k`-th multi-index in tensor order, first axis slowest.
#[derive(Clone, Debug)]
pub struct Approximant {
    basis: BasisKind,
    degrees: Vec<u32>,
    indices: Vec<Vec<u32>>,
    coefficients: Coefficients,
    numeric: Vec<f64>,
    precision: PrecisionKind,
    domain: Domain,
    grid: SampleGrid,
}

impl Approximant {
    /// Fits an expansion of the given per-axis degrees to `values`, sampled
    /// at the physical nodes of `grid`.
    pub fn fit(
        domain: &Domain,
        grid: SampleGrid,
        degrees: &[u32],
        values: &[f64],
        precision: PrecisionKind,
    ) -> Result<Approximant, ApproximationError> {
        precision.validate()?;

        if degrees.len() != domain.dim() {
            return Err(ConfigError::DegreeArity {
                expected: domain.dim(),
                found: degrees.len(),
            }
            .into());
        }

        if values.len() != grid.len() {
            return Err(ApproximationError::SampleCount {
                expected: grid.len(),
                found: values.len(),
            });
        }

        if let Some((index, &value)) =
            values.iter().find_position(|v| !v.is_finite())
        {
            return Err(ApproximationError::NonFiniteSample { index, value });
        }

        let indices: Vec<Vec<u32>> = degrees
            .iter()
            .map(|&d| 0..=d)
            .multi_cartesian_product()
            .collect();

        if grid.len() < indices.len() {
            return Err(ApproximationError::Underdetermined {
                samples: grid.len(),
                basis: indices.len(),
            });
        }

        let design = Design {
            basis: grid.basis(),
            degrees,
            indices: &indices,
        };

        let coefficients = match precision {
            PrecisionKind::Float64 => {
                let (a, b) = design.float_system(grid.reference(), values);

                Coefficients::Float(solve::solve_float(a, b)?)
            }
            PrecisionKind::Rational => {
                let (a, b) = design.exact_system(grid.reference(), values)?;

                Coefficients::Rational(solve::solve_rational(
                    &a,
                    &b,
                    |x| x,
                    &Rational::ZERO,
                )?)
            }
            PrecisionKind::ArbitraryFloat { bits } => {
                let round = solve::significant(bits);
                let (a, b) = design.exact_system(grid.reference(), values)?;

                let a: Vec<Vec<Rational>> = a
                    .into_iter()
                    .map(|row| row.into_iter().map(&round).collect())
                    .collect();
                let b: Vec<Rational> = b.into_iter().map(&round).collect();
                let floor = solve::relative_floor(&a, bits);

                Coefficients::Rational(solve::solve_rational(
                    &a, &b, round, &floor,
                )?)
            }
            PrecisionKind::ArbitraryInteger { bits } => {
                let (a, b) =
                    design.integer_system(grid.reference(), values, bits)?;

                Coefficients::Rational(solve::solve_integer(&a, &b)?)
            }
        };

        log::debug!(
            "fit {} coefficients ({precision}) on {} samples",
            coefficients.len(),
            grid.len()
        );

        let numeric = coefficients.to_f64();

        Ok(Approximant {
            basis: grid.basis(),
            degrees: degrees.to_vec(),
            indices,
            coefficients,
            numeric,
            precision,
            domain: domain.clone(),
            grid,
        })
    }

    pub fn basis(&self) -> BasisKind {
        self.basis
    }

    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    pub fn precision(&self) -> PrecisionKind {
        self.precision
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    /// Evaluates the approximant at a physical point.
    pub fn eval(&self, point: &[f64]) -> f64 {
        self.eval_reference(&self.domain.to_reference(point))
    }

    /// Evaluates the approximant at a point of the reference cube.
    pub fn eval_reference(&self, xi: &[f64]) -> f64 {
        let values: Vec<Vec<f64>> = self
            .degrees
            .iter()
            .zip(xi)
            .map(|(&d, &x)| self.basis.eval_all(d, x))
            .collect();

        self.indices
            .iter()
            .zip(&self.numeric)
            .map(|(index, c)| c * product(&values, index))
            .sum()
    }

    /// Expands the approximant in the monomial basis of reference
    /// coordinates.
    ///
    /// Coefficients smaller than `cutoff` times the largest one are dropped
    /// first.
    pub fn to_polynomial(
        &self,
        cutoff: f64,
    ) -> Result<Polynomial, ApproximationError> {
        let coefficients = self.coefficients.to_rational().ok_or_else(|| {
            ApproximationError::Numerical("non-finite coefficient".to_string())
        })?;

        let largest =
            self.numeric.iter().fold(0.0, |m: f64, c| m.max(c.abs()));
        let threshold = cutoff * largest;

        let tables: Vec<Vec<Vec<Rational>>> = self
            .degrees
            .iter()
            .map(|&d| self.basis.monomial_table(d))
            .collect();

        let mut polynomial = Polynomial::zero(self.degrees.len());
        let mut dropped = 0;

        for ((index, c), magnitude) in
            self.indices.iter().zip(&coefficients).zip(&self.numeric)
        {
            if *c == Rational::ZERO {
                continue;
            }

            if magnitude.abs() < threshold {
                dropped += 1;
                continue;
            }

            let factors = index.iter().zip(&tables).map(|(&k, table)| {
                table[k as usize]
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| **t != Rational::ZERO)
                    .collect::<Vec<_>>()
            });

            for combination in factors.multi_cartesian_product() {
                let exponents: Vec<u32> =
                    combination.iter().map(|&(e, _)| e as u32).collect();
                let coefficient = combination
                    .iter()
                    .fold(c.clone(), |acc, &(_, t)| acc * t);

                polynomial.add_term(&exponents, coefficient);
            }
        }

        if dropped > 0 {
            log::debug!("dropped {dropped} coefficients below {threshold:.3e}");
        }

        Ok(polynomial)
    }
}

fn product(values: &[Vec<f64>], index: &[u32]) -> f64 {
    values
        .iter()
        .zip(index)
        .map(|(axis, &k)| axis[k as usize])
        .product()
}

/// Builds design matrices in the arithmetic of each precision kind.
struct Design<'a> {
    basis: BasisKind,
    degrees: &'a [u32],
    indices: &'a [Vec<u32>],
}

impl Design<'_> {
    fn float_system(
        &self,
        nodes: &[Vec<f64>],
        values: &[f64],
    ) -> (DMatrix<f64>, DVector<f64>) {
        let rows: Vec<f64> =
            nodes.iter().flat_map(|xi| self.float_row(xi)).collect();

        (
            DMatrix::from_row_slice(nodes.len(), self.indices.len(), &rows),
            DVector::from_column_slice(values),
        )
    }

    fn float_row(&self, xi: &[f64]) -> Vec<f64> {
        let values: Vec<Vec<f64>> = self
            .degrees
            .iter()
            .zip(xi)
            .map(|(&d, &x)| self.basis.eval_all(d, x))
            .collect();

        self.indices.iter().map(|index| product(&values, index)).collect()
    }

    fn exact_system(
        &self,
        nodes: &[Vec<f64>],
        values: &[f64],
    ) -> Result<(Vec<Vec<Rational>>, Vec<Rational>), ApproximationError> {
        let rows = nodes
            .iter()
            .map(|xi| {
                let axes = self
                    .degrees
                    .iter()
                    .zip(xi)
                    .map(|(&d, &x)| {
                        let x = exact(x)?;

                        Ok(self.basis.eval_all_exact(d, &x))
                    })
                    .collect::<Result<Vec<_>, ApproximationError>>()?;

                Ok(self
                    .indices
                    .iter()
                    .map(|index| {
                        axes.iter()
                            .zip(index)
                            .fold(Rational::from(1), |acc, (axis, &k)| {
                                acc * &axis[k as usize]
                            })
                    })
                    .collect())
            })
            .collect::<Result<Vec<Vec<Rational>>, ApproximationError>>()?;

        let rhs = values
            .iter()
            .map(|&y| exact(y))
            .collect::<Result<_, _>>()?;

        Ok((rows, rhs))
    }

    fn integer_system(
        &self,
        nodes: &[Vec<f64>],
        values: &[f64],
        bits: u32,
    ) -> Result<(Vec<Vec<Integer>>, Vec<Integer>), ApproximationError> {
        let rows = nodes
            .iter()
            .map(|xi| {
                self.float_row(xi)
                    .into_iter()
                    .map(|x| quantized(x, bits))
                    .collect()
            })
            .collect::<Result<Vec<Vec<Integer>>, ApproximationError>>()?;

        let rhs = values
            .iter()
            .map(|&y| quantized(y, bits))
            .collect::<Result<_, _>>()?;

        Ok((rows, rhs))
    }
}

fn exact(x: f64) -> Result<Rational, ApproximationError> {
    exact_rational(x).ok_or_else(|| {
        ApproximationError::Numerical(format!("cannot represent {x} exactly"))
    })
}

fn quantized(x: f64, bits: u32) -> Result<Integer, ApproximationError> {
    quantize(x, bits).ok_or_else(|| {
        ApproximationError::Numerical(format!("cannot quantize {x}"))
    })
}

/// Failure to produce an approximant.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ApproximationError {
    Config(ConfigError),
    SampleCount { expected: usize, found: usize },
    NonFiniteSample { index: usize, value: f64 },
    Underdetermined { samples: usize, basis: usize },
    RankDeficient { rank: usize, basis: usize },
    Numerical(String),
}

impl fmt::Display for ApproximationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApproximationError::Config(err) => err.fmt(f),
            ApproximationError::SampleCount { expected, found } => {
                write!(f, "expected {expected} samples, found {found}")
            }
            ApproximationError::NonFiniteSample { index, value } => {
                write!(f, "sample {index} is not finite ({value})")
            }
            ApproximationError::Underdetermined { samples, basis } => write!(
                f,
                "{samples} samples cannot determine {basis} coefficients"
            ),
            ApproximationError::RankDeficient { rank, basis } => write!(
                f,
                "design matrix has rank {rank}, need {basis}"
            ),
            ApproximationError::Numerical(reason) => {
                write!(f, "numerical failure: {reason}")
            }
        }
    }
}

impl std::error::Error for ApproximationError {}

impl From<ConfigError> for ApproximationError {
    fn from(err: ConfigError) -> Self {
        ApproximationError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn target(x: &[f64]) -> f64 {
        1.0 + 2.0 * x[0] - 3.0 * x[0] * x[1] + 0.5 * x[1] * x[1]
    }

    fn fit(
        precision: PrecisionKind,
        basis: BasisKind,
        oversample: u32,
    ) -> Approximant {
        let domain = Domain::new(vec![0.5, -1.0], vec![2.0, 1.0]).unwrap();
        let grid =
            SampleGrid::new(&domain, basis, &[2, 2], oversample).unwrap();
        let values = grid.sample(&target);

        Approximant::fit(&domain, grid, &[2, 2], &values, precision).unwrap()
    }

    #[test]
    fn reproduces_low_degree_polynomials() {
        let cases = [
            (PrecisionKind::Float64, 1e-12),
            (PrecisionKind::Rational, 1e-12),
            (PrecisionKind::ArbitraryFloat { bits: 96 }, 1e-12),
            (PrecisionKind::ArbitraryInteger { bits: 48 }, 1e-9),
        ];

        for (precision, tolerance) in cases {
            for basis in [BasisKind::Chebyshev, BasisKind::Legendre] {
                for oversample in [0, 2] {
                    let approximant = fit(precision, basis, oversample);

                    assert_eq!(approximant.coefficients().len(), 9);

                    for x in [[0.0, -1.0], [2.1, -0.3], [-1.2, -1.9]] {
                        assert_abs_diff_eq!(
                            approximant.eval(&x),
                            target(&x),
                            epsilon = tolerance
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn exact_precisions_give_rationals() {
        let approximant = fit(PrecisionKind::Rational, BasisKind::Chebyshev, 0);

        assert!(matches!(
            approximant.coefficients(),
            Coefficients::Rational(_)
        ));

        let approximant = fit(PrecisionKind::Float64, BasisKind::Chebyshev, 0);

        assert!(matches!(approximant.coefficients(), Coefficients::Float(_)));
    }

    #[test]
    fn monomial_expansion_agrees() {
        let approximant = fit(PrecisionKind::Float64, BasisKind::Legendre, 1);
        let polynomial = approximant.to_polynomial(1e-12).unwrap();

        for xi in [[0.3, -0.7], [-1.0, 1.0], [0.0, 0.25]] {
            assert_abs_diff_eq!(
                polynomial.eval(&xi),
                approximant.eval_reference(&xi),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn cutoff_drops_noise() {
        let domain = Domain::cube(vec![0.0], 1.0).unwrap();
        let grid =
            SampleGrid::new(&domain, BasisKind::Chebyshev, &[4], 0).unwrap();
        let values = grid.sample(&|x: &[f64]| x[0] * x[0]);

        let approximant = Approximant::fit(
            &domain,
            grid,
            &[4],
            &values,
            PrecisionKind::Float64,
        )
        .unwrap();

        let polynomial = approximant.to_polynomial(1e-10).unwrap();

        assert_eq!(polynomial.degree(), 2);
    }

    #[test]
    fn rejects_bad_inputs() {
        let domain = Domain::cube(vec![0.0], 1.0).unwrap();
        let grid =
            SampleGrid::new(&domain, BasisKind::Chebyshev, &[1], 0).unwrap();

        let result = Approximant::fit(
            &domain,
            grid.clone(),
            &[3],
            &[1.0, 2.0],
            PrecisionKind::Float64,
        );

        assert_eq!(
            result.unwrap_err(),
            ApproximationError::Underdetermined {
                samples: 2,
                basis: 4
            }
        );

        let result = Approximant::fit(
            &domain,
            grid,
            &[1],
            &[1.0, f64::NAN],
            PrecisionKind::Rational,
        );

        assert!(matches!(
            result,
            Err(ApproximationError::NonFiniteSample { index: 1, .. })
        ));
    }

    #[test]
    fn parses_precision() {
        assert_eq!(
            "float64".parse::<PrecisionKind>(),
            Ok(PrecisionKind::Float64)
        );
        assert_eq!(
            "integer:64".parse::<PrecisionKind>(),
            Ok(PrecisionKind::ArbitraryInteger { bits: 64 })
        );
        assert_eq!(
            "float:4".parse::<PrecisionKind>(),
            Err(ConfigError::InvalidPrecision("too few bits"))
        );
        assert!("decimal".parse::<PrecisionKind>().is_err());
        assert_eq!(
            PrecisionKind::ArbitraryFloat { bits: 128 }.to_string(),
            "float:128"
        );
    }
}
