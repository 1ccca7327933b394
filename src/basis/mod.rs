//! Orthogonal polynomial bases on `[-1, 1]`.

mod grid;

use std::f64::consts::PI;

use malachite::num::basic::traits::{One, Zero};
use malachite::Rational;
use strum_macros::{EnumString, IntoStaticStr};

pub use grid::{validation_points, SampleGrid};

/// A family of orthogonal polynomials.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BasisKind {
    #[default]
    Chebyshev,
    Legendre,
}

impl BasisKind {
    /// Evaluates the basis polynomials of degrees `0..=degree` at `x`.
    pub fn eval_all(self, degree: u32, x: f64) -> Vec<f64> {
        let mut values = Vec::with_capacity(degree as usize + 1);

        values.push(1.0);

        if degree >= 1 {
            values.push(x);
        }

        for k in 1..degree as usize {
            let (prev, curr) = (values[k - 1], values[k]);

            let next = match self {
                BasisKind::Chebyshev => 2.0 * x * curr - prev,
                BasisKind::Legendre => {
                    let k = k as f64;

                    ((2.0 * k + 1.0) * x * curr - k * prev) / (k + 1.0)
                }
            };

            values.push(next);
        }

        values
    }

    /// Evaluates the basis polynomials of degrees `0..=degree` at `x` in
    /// exact arithmetic.
    pub fn eval_all_exact(self, degree: u32, x: &Rational) -> Vec<Rational> {
        let mut values = Vec::with_capacity(degree as usize + 1);

        values.push(Rational::ONE);

        if degree >= 1 {
            values.push(x.clone());
        }

        for k in 1..degree as usize {
            let next = match self {
                BasisKind::Chebyshev => {
                    Rational::from(2) * x * &values[k] - &values[k - 1]
                }
                BasisKind::Legendre => {
                    let k = k as u64;
                    let a = Rational::from_unsigneds(2 * k + 1, k + 1);
                    let b = Rational::from_unsigneds(k, k + 1);

                    a * x * &values[k as usize] - b * &values[k as usize - 1]
                }
            };

            values.push(next);
        }

        values
    }

    /// Evaluates the basis polynomial of degree `k` at `x`.
    pub fn eval(self, k: u32, x: f64) -> f64 {
        self.eval_all(k, x)[k as usize]
    }

    /// Returns `count` sample nodes in ascending order: Chebyshev-Gauss
    /// points for the Chebyshev basis and Gauss-Legendre points for the
    /// Legendre basis.
    pub fn nodes(self, count: usize) -> Vec<f64> {
        match self {
            BasisKind::Chebyshev => chebyshev_nodes(count),
            BasisKind::Legendre => legendre_nodes(count),
        }
    }

    /// Computes the monomial coefficients of the basis polynomials of degrees
    /// `0..=degree`, exactly.
    ///
    /// Row `k` holds the coefficients of `x^0, ..., x^k`.
    pub fn monomial_table(self, degree: u32) -> Vec<Vec<Rational>> {
        let mut table: Vec<Vec<Rational>> = vec![vec![Rational::ONE]];

        if degree >= 1 {
            table.push(vec![Rational::ZERO, Rational::ONE]);
        }

        for k in 1..degree as usize {
            // Multiply by x, then combine with the previous row.
            let shifted: Vec<Rational> = std::iter::once(Rational::ZERO)
                .chain(table[k].iter().cloned())
                .collect();

            let (a, b) = match self {
                BasisKind::Chebyshev => (Rational::from(2), Rational::ONE),
                BasisKind::Legendre => (
                    Rational::from_unsigneds(2 * k as u64 + 1, k as u64 + 1),
                    Rational::from_unsigneds(k as u64, k as u64 + 1),
                ),
            };

            let next = shifted
                .into_iter()
                .enumerate()
                .map(|(i, c)| {
                    let prev = table[k - 1]
                        .get(i)
                        .map_or(Rational::ZERO, |p| &b * p);

                    &a * c - prev
                })
                .collect();

            table.push(next);
        }

        table
    }
}

fn chebyshev_nodes(count: usize) -> Vec<f64> {
    let n = count as f64;

    (0..count)
        .map(|i| -((2 * i + 1) as f64 * PI / (2.0 * n)).cos())
        .map(|x| if x.abs() < f64::EPSILON { 0.0 } else { x })
        .collect()
}

fn legendre_nodes(count: usize) -> Vec<f64> {
    const MAX_ITERATIONS: usize = 100;

    let n = count as f64;
    let mut nodes = Vec::with_capacity(count);

    for i in 0..count {
        // Tricomi's initial guess for the i-th largest root.
        let mut x = (PI * (i as f64 + 0.75) / (n + 0.5)).cos();

        for _ in 0..MAX_ITERATIONS {
            let (p, dp) = legendre_with_derivative(count, x);
            let dx = p / dp;

            x -= dx;

            if dx.abs() <= 4.0 * f64::EPSILON {
                break;
            }
        }

        nodes.push(if x.abs() < f64::EPSILON { 0.0 } else { -x });
    }

    nodes
}

/// Evaluates `P_n(x)` and `P_n'(x)`.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let (mut prev, mut curr) = (1.0, x);

    if n == 0 {
        return (1.0, 0.0);
    }

    for k in 1..n {
        let k = k as f64;
        let next = ((2.0 * k + 1.0) * x * curr - k * prev) / (k + 1.0);

        (prev, curr) = (curr, next);
    }

    let derivative = n as f64 * (x * curr - prev) / (x * x - 1.0);

    (curr, derivative)
}
