//! Derivatives of the objective and of approximants.
//!
//! Finite differences are taken in a frame `x = x0 + s * u` with per-axis
//! scales chosen so that the fixed unit step of `finitediff` lands on a
//! step of `h * max(1, |x0_i|)` in physical coordinates.

use finitediff::FiniteDiff;

use crate::approx::{Approximant, ApproximationError};
use crate::domain::Domain;
use crate::poly::Polynomial;

/// Step `finitediff` takes along each coordinate.
fn unit_step() -> f64 {
    f64::EPSILON.sqrt()
}

fn frame(x: &[f64], h: f64) -> Vec<f64> {
    x.iter().map(|v| h * v.abs().max(1.0) / unit_step()).collect()
}

fn shift(x: &[f64], scales: &[f64], u: &[f64]) -> Vec<f64> {
    itertools::izip!(x, scales, u)
        .map(|(x, s, u)| x + s * u)
        .collect()
}

/// Central-difference gradient of `f` at `x`.
pub fn gradient<F>(f: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64 + ?Sized,
{
    let scales = frame(x, f64::EPSILON.cbrt());
    let objective = |u: &Vec<f64>| f(&shift(x, &scales, u));

    vec![0.0; x.len()]
        .central_diff(&objective)
        .iter()
        .zip(&scales)
        .map(|(d, s)| d / s)
        .collect()
}

/// Central-difference Hessian of `f` at `x`, symmetrized.
///
/// The gradient is differentiated in the scaled frame, where the Hessian is
/// `s_i * s_j * H_ij`, and mapped back entry by entry.
pub fn hessian<F>(f: &F, x: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> f64 + ?Sized,
{
    let scales = frame(x, f64::EPSILON.powf(0.25));
    let grad = |u: &Vec<f64>| {
        gradient(f, &shift(x, &scales, u))
            .iter()
            .zip(&scales)
            .map(|(g, s)| g * s)
            .collect::<Vec<f64>>()
    };

    let mut rows = vec![0.0; x.len()].central_hessian(&grad);

    for (row, si) in rows.iter_mut().zip(&scales) {
        for (h, sj) in row.iter_mut().zip(&scales) {
            *h /= si * sj;
        }
    }

    symmetrize(&mut rows);

    rows
}

fn symmetrize(rows: &mut [Vec<f64>]) {
    for i in 0..rows.len() {
        for j in 0..i {
            let mean = (rows[i][j] + rows[j][i]) / 2.0;

            rows[i][j] = mean;
            rows[j][i] = mean;
        }
    }
}

/// Second derivatives of an approximant's monomial expansion.
#[derive(Clone, Debug)]
pub struct ApproximantHessian {
    second: Vec<Vec<Polynomial>>,
    domain: Domain,
}

impl ApproximantHessian {
    pub fn new(
        approximant: &Approximant,
        cutoff: f64,
    ) -> Result<ApproximantHessian, ApproximationError> {
        let polynomial = approximant.to_polynomial(cutoff)?;
        let n = polynomial.nvars();

        let second = (0..n)
            .map(|i| {
                let first = polynomial.derivative(i);

                (0..n).map(|j| first.derivative(j)).collect()
            })
            .collect();

        Ok(ApproximantHessian {
            second,
            domain: approximant.domain().clone(),
        })
    }

    /// The Hessian at a physical point.
    pub fn at(&self, x: &[f64]) -> Vec<Vec<f64>> {
        let xi = self.domain.to_reference(x);
        let scale = self.domain.scale();

        self.second
            .iter()
            .zip(scale)
            .map(|(row, si)| {
                row.iter()
                    .zip(scale)
                    .map(|(p, sj)| p.eval(&xi) / (si * sj))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::approx::PrecisionKind;
    use crate::basis::{BasisKind, SampleGrid};

    fn cubic(x: &[f64]) -> f64 {
        x[0].powi(3) + 2.0 * x[0] * x[1] - x[1] * x[1]
    }

    #[test]
    fn gradient_of_cubic() {
        let g = gradient(&cubic, &[1.5, -2.0]);

        assert_abs_diff_eq!(g[0], 3.0 * 2.25 - 4.0, epsilon = 1e-7);
        assert_abs_diff_eq!(g[1], 3.0 + 4.0, epsilon = 1e-7);
    }

    #[test]
    fn gradient_scales_with_magnitude() {
        let f = |x: &[f64]| (x[0] - 1e4).powi(2);
        let g = gradient(&f, &[1e4 + 1.0]);

        assert_abs_diff_eq!(g[0], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn hessian_of_cubic() {
        let h = hessian(&cubic, &[1.5, -2.0]);

        assert_abs_diff_eq!(h[0][0], 9.0, epsilon = 1e-4);
        assert_abs_diff_eq!(h[0][1], 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(h[1][1], -2.0, epsilon = 1e-4);
        assert_eq!(h[0][1], h[1][0]);
    }

    #[test]
    fn hessian_with_unequal_magnitudes() {
        let f = |x: &[f64]| x[0] * x[0] * x[1];
        let h = hessian(&f, &[100.0, 0.5]);

        assert_abs_diff_eq!(h[0][0], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(h[0][1], 200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(h[1][0], 200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(h[1][1], 0.0, epsilon = 1e-2);
    }

    #[test]
    fn approximant_hessian_matches() {
        let domain = Domain::new(vec![1.0, 0.0], vec![2.0, 3.0]).unwrap();
        let grid =
            SampleGrid::new(&domain, BasisKind::Legendre, &[3, 3], 0).unwrap();
        let values = grid.sample(&cubic);
        let approximant = Approximant::fit(
            &domain,
            grid,
            &[3, 3],
            &values,
            PrecisionKind::Float64,
        )
        .unwrap();

        let hessian = ApproximantHessian::new(&approximant, 0.0).unwrap();
        let h = hessian.at(&[0.5, 1.0]);

        assert_abs_diff_eq!(h[0][0], 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(h[0][1], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(h[1][0], 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(h[1][1], -2.0, epsilon = 1e-8);
    }
}
